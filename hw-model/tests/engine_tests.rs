// Licensed under the Apache-2.0 license

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tegra_se_drivers::{
    AesKeyInfo, AesMode, ChipFamily, SeAlgorithm, SeClient, SeConfig, SeEngine, SeError,
    SeResult, SeSession, ShaMode, AES_BLOCK_SIZE,
};
use tegra_se_emu_crypto::{cbc_encrypt, Sha, ShaAlgo};
use tegra_se_emu_types::RvSize;
use tegra_se_hw_model::{new_engine, InitParams, ModelEmulated, SeKnobs};
use tegra_se_registers::se;

fn config() -> SeConfig {
    SeConfig {
        chip: ChipFamily::T114,
        buffer_size: 2176,
        op_timeout: Duration::from_millis(100),
        ..Default::default()
    }
}

fn engine() -> (Arc<ModelEmulated>, SeEngine<ModelEmulated>) {
    new_engine(InitParams::default(), config()).unwrap()
}

fn free_key_slots(engine: &SeEngine<ModelEmulated>) -> usize {
    let mut slots = vec![];
    while let Ok(slot) = engine.allocate_key_slot() {
        slots.push(slot);
    }
    for slot in &slots {
        engine.release_key_slot(*slot).unwrap();
    }
    slots.len()
}

fn encrypt_block(client: &mut SeClient<'_, ModelEmulated>) -> SeResult<()> {
    client.aes_select_operation(AesMode::Ecb, true)?;
    let mut out = [0u8; AES_BLOCK_SIZE];
    client.aes_process_buffer(&[0; AES_BLOCK_SIZE], &mut out)
}

#[test]
fn test_init_and_deinit() {
    let (model, engine) = engine();
    assert!(engine.is_init_done());
    assert!(model.is_interrupt_registered());
    assert_eq!(model.live_dma_regions().len(), 8);
    assert_eq!(engine.init(), Ok(()));
    assert_eq!(model.live_dma_regions().len(), 8);

    // Key schedule reads are disabled and interrupts masked
    let read = |offset| model.with_se(|hw| hw.read(RvSize::Word, offset).unwrap());
    assert_eq!(read(se::SE_SECURITY), 0);
    assert_eq!(read(se::INT_ENABLE), 0);

    engine.deinit();
    engine.deinit();
    assert!(!engine.is_init_done());
    assert!(!model.is_interrupt_registered());
    assert!(model.live_dma_regions().is_empty());
    assert_eq!(
        engine.allocate_key_slot(),
        Err(SeError::ENGINE_NOT_INITIALIZED)
    );

    assert_eq!(engine.init(), Ok(()));
    assert_eq!(free_key_slots(&engine), 14);
}

#[test]
fn test_init_failures() {
    let bad = SeConfig {
        buffer_size: 1000,
        ..config()
    };
    assert_eq!(
        new_engine(InitParams::default(), bad).err(),
        Some(SeError::ENGINE_INVALID_CONFIG)
    );

    let params = InitParams {
        ram_size: 4096,
        ..Default::default()
    };
    let model = Arc::new(ModelEmulated::new(params));
    let engine = SeEngine::new(model.clone(), config());
    assert_eq!(engine.init(), Err(SeError::ENGINE_DMA_ALLOC_FAILED));
    assert!(model.live_dma_regions().is_empty());

    let model = Arc::new(ModelEmulated::new(InitParams::default()));
    model.set_fail_register_interrupt(true);
    let engine = SeEngine::new(model.clone(), config());
    assert_eq!(
        engine.init(),
        Err(SeError::ENGINE_INTERRUPT_REGISTER_FAILED)
    );
    assert!(model.live_dma_regions().is_empty());
    assert!(!engine.is_init_done());
}

#[test]
fn test_key_slot_exhaustion() {
    let (_model, engine) = engine();
    let slots: Vec<u32> = (0..14).map(|_| engine.allocate_key_slot().unwrap()).collect();
    assert_eq!(engine.allocate_key_slot(), Err(SeError::KEY_SLOT_EXHAUSTED));

    let mut client = SeClient::new(&engine);
    client.select_algorithm(SeAlgorithm::Aes).unwrap();
    assert_eq!(
        client.aes_select_key(&AesKeyInfo::user(&[0; 16])),
        Err(SeError::KEY_SLOT_EXHAUSTED)
    );

    engine.release_key_slot(slots[3]).unwrap();
    client.aes_select_key(&AesKeyInfo::user(&[0; 16])).unwrap();
    assert_eq!(client.aes().unwrap().key_slot(), Some(slots[3]));
}

#[test]
fn test_client_releases_key_slot() {
    let (_model, engine) = engine();
    {
        let mut client = SeClient::new(&engine);
        client.select_algorithm(SeAlgorithm::Aes).unwrap();
        client.aes_select_key(&AesKeyInfo::user(&[1; 16])).unwrap();
        // Reselecting reuses the slot
        client.aes_select_key(&AesKeyInfo::user(&[2; 24])).unwrap();
        assert_eq!(free_key_slots(&engine), 13);

        // Switching algorithm drops the AES session
        client
            .select_algorithm(SeAlgorithm::Sha {
                mode: ShaMode::Sha1,
                total_size: 1,
            })
            .unwrap();
        assert_eq!(free_key_slots(&engine), 14);

        client.select_algorithm(SeAlgorithm::Aes).unwrap();
        client.aes_select_key(&AesKeyInfo::user(&[3; 32])).unwrap();
        assert_eq!(free_key_slots(&engine), 13);
    }
    assert_eq!(free_key_slots(&engine), 14);
}

#[test]
fn test_client_wrong_algorithm() {
    let (_model, engine) = engine();
    let mut client = SeClient::new(&engine);
    assert!(client.session().is_none());
    assert_eq!(client.sha_update(b"abc"), Err(SeError::CLIENT_NO_ALGORITHM));

    client
        .select_algorithm(SeAlgorithm::Sha {
            mode: ShaMode::Sha256,
            total_size: 3,
        })
        .unwrap();
    assert!(matches!(client.session(), Some(SeSession::Sha(_))));
    assert_eq!(
        client.aes_set_iv(&[0; AES_BLOCK_SIZE]),
        Err(SeError::CLIENT_WRONG_ALGORITHM)
    );
    let mut out = [0u8; 16];
    assert_eq!(
        client.rng_generate(&mut out),
        Err(SeError::CLIENT_WRONG_ALGORITHM)
    );
}

#[test]
fn test_operation_timeout() {
    let (model, engine) = engine();
    let mut client = SeClient::new(&engine);
    client.select_algorithm(SeAlgorithm::Aes).unwrap();
    client.aes_select_key(&AesKeyInfo::user(&[0; 16])).unwrap();

    model.set_knobs(SeKnobs {
        stall: true,
        ..Default::default()
    });
    let start = Instant::now();
    assert_eq!(encrypt_block(&mut client), Err(SeError::HW_OP_TIMEOUT));
    let elapsed = start.elapsed();
    assert!(elapsed >= config().op_timeout);
    assert!(elapsed < config().op_timeout + Duration::from_secs(1));

    // The engine recovers once the hardware behaves again
    model.set_knobs(SeKnobs::default());
    assert_eq!(encrypt_block(&mut client), Ok(()));
}

#[test]
fn test_context_save_timeout() {
    let ctx_save_timeout = Duration::from_millis(50);
    let (model, engine) = new_engine(
        InitParams::default(),
        SeConfig {
            ctx_save_timeout,
            ..config()
        },
    )
    .unwrap();
    model.set_knobs(SeKnobs {
        stall_ctx_save: true,
        ..Default::default()
    });

    let start = Instant::now();
    assert_eq!(engine.suspend(), Err(SeError::HW_OP_TIMEOUT));
    let elapsed = start.elapsed();
    assert!(elapsed >= ctx_save_timeout);
    assert!(elapsed < ctx_save_timeout + Duration::from_secs(1));

    model.set_knobs(SeKnobs::default());
    assert!(engine.suspend().is_ok());
}

#[test]
fn test_error_status() {
    let (model, engine) = engine();
    let mut client = SeClient::new(&engine);
    client.select_algorithm(SeAlgorithm::Aes).unwrap();
    client.aes_select_key(&AesKeyInfo::user(&[0; 16])).unwrap();

    model.set_knobs(SeKnobs {
        inject_error: true,
        ..Default::default()
    });
    assert_eq!(encrypt_block(&mut client), Err(SeError::HW_ERROR_STATUS));

    model.set_knobs(SeKnobs::default());
    assert_eq!(encrypt_block(&mut client), Ok(()));
}

#[test]
fn test_operations_do_not_interleave() {
    let (model, engine) = engine();
    let iterations = 20;
    model.start_access_log();

    std::thread::scope(|scope| {
        for t in 0..2u8 {
            let engine = &engine;
            scope.spawn(move || {
                let key = [t + 1; 16];
                let iv = [t; AES_BLOCK_SIZE];
                let plaintext: Vec<u8> = (0..64).map(|i| i ^ t).collect();
                let mut expected = plaintext.clone();
                cbc_encrypt(&key, &iv, &mut expected);

                let mut client = SeClient::new(engine);
                client.select_algorithm(SeAlgorithm::Aes).unwrap();
                client.aes_select_key(&AesKeyInfo::user(&key)).unwrap();
                client.aes_select_operation(AesMode::Cbc, true).unwrap();
                for _ in 0..iterations {
                    client.aes_set_iv(&iv).unwrap();
                    let mut out = vec![0u8; plaintext.len()];
                    client.aes_process_buffer(&plaintext, &mut out).unwrap();
                    assert_eq!(out, expected);
                }
            });
        }
    });

    let log = model.take_access_log();
    let threads: HashSet<_> = log.iter().map(|access| access.thread).collect();
    assert_eq!(threads.len(), 2);

    // Each operation is started by the thread that configured it
    let mut config_owner = None;
    let mut starts = 0;
    for access in &log {
        if access.is_write_to(se::CONFIG) {
            config_owner = Some(access.thread);
        }
        if access.is_write_to(se::OPERATION) {
            assert_eq!(config_owner, Some(access.thread));
            starts += 1;
        }
    }
    assert_eq!(starts, 2 * iterations);
}

#[test]
fn test_sha_and_aes_do_not_interleave() {
    let (model, engine) = engine();
    let iterations = 5;
    let message: Vec<u8> = (0..5000u32).map(|i| (i * 7 + 3) as u8).collect();
    let digest = Sha::hash(ShaAlgo::Sha256, &message);
    let key = [0x5a; 16];
    let iv = [0xa5; AES_BLOCK_SIZE];
    let plaintext: Vec<u8> = (0..256u32).map(|i| i as u8).collect();
    let mut ciphertext = plaintext.clone();
    cbc_encrypt(&key, &iv, &mut ciphertext);
    model.start_access_log();

    std::thread::scope(|scope| {
        let engine = &engine;
        let (message, digest) = (&message, &digest);
        scope.spawn(move || {
            let mut client = SeClient::new(engine);
            for _ in 0..iterations {
                client
                    .select_algorithm(SeAlgorithm::Sha {
                        mode: ShaMode::Sha256,
                        total_size: message.len(),
                    })
                    .unwrap();
                for part in [&message[..1280], &message[1280..2560], &message[2560..]] {
                    client.sha_update(part).unwrap();
                }
                let mut out = [0u8; 32];
                client.sha_final(&mut out).unwrap();
                assert_eq!(&out[..], &digest[..]);
            }
        });

        let (plaintext, ciphertext) = (&plaintext, &ciphertext);
        scope.spawn(move || {
            let mut client = SeClient::new(engine);
            client.select_algorithm(SeAlgorithm::Aes).unwrap();
            client.aes_select_key(&AesKeyInfo::user(&key)).unwrap();
            client.aes_select_operation(AesMode::Cbc, true).unwrap();
            for _ in 0..iterations * 4 {
                client.aes_set_iv(&iv).unwrap();
                let mut out = vec![0u8; plaintext.len()];
                client.aes_process_buffer(plaintext, &mut out).unwrap();
                assert_eq!(&out, ciphertext);
            }
        });
    });

    let log = model.take_access_log();
    let threads: HashSet<_> = log.iter().map(|access| access.thread).collect();
    assert_eq!(threads.len(), 2);

    let mut config_owner = None;
    for access in &log {
        if access.is_write_to(se::CONFIG) {
            config_owner = Some(access.thread);
        }
        if access.is_write_to(se::OPERATION) {
            assert_eq!(config_owner, Some(access.thread));
        }
    }
}

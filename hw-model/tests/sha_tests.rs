// Licensed under the Apache-2.0 license

use std::sync::Arc;
use std::time::Duration;

use tegra_se_drivers::{ChipFamily, SeAlgorithm, SeClient, SeConfig, SeEngine, SeError, ShaMode};
use tegra_se_emu_crypto::{Sha, ShaAlgo};
use tegra_se_hw_model::{new_engine, InitParams, ModelEmulated};

fn engine(config: SeConfig) -> (Arc<ModelEmulated>, SeEngine<ModelEmulated>) {
    new_engine(InitParams::default(), config).unwrap()
}

fn small_buffers() -> SeConfig {
    SeConfig {
        chip: ChipFamily::T114,
        buffer_size: 2176,
        ..Default::default()
    }
}

fn algo(mode: ShaMode) -> ShaAlgo {
    match mode {
        ShaMode::Sha1 => ShaAlgo::Sha1,
        ShaMode::Sha224 => ShaAlgo::Sha224,
        ShaMode::Sha256 => ShaAlgo::Sha256,
        ShaMode::Sha384 => ShaAlgo::Sha384,
        ShaMode::Sha512 => ShaAlgo::Sha512,
    }
}

fn message(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

fn hash(engine: &SeEngine<ModelEmulated>, mode: ShaMode, parts: &[&[u8]]) -> Vec<u8> {
    let total_size = parts.iter().map(|p| p.len()).sum();
    let mut client = SeClient::new(engine);
    client
        .select_algorithm(SeAlgorithm::Sha { mode, total_size })
        .unwrap();
    for part in parts {
        client.sha_update(part).unwrap();
    }
    let mut digest = vec![0u8; mode.digest_size()];
    client.sha_final(&mut digest).unwrap();
    digest
}

const ALL_MODES: [ShaMode; 5] = [
    ShaMode::Sha1,
    ShaMode::Sha224,
    ShaMode::Sha256,
    ShaMode::Sha384,
    ShaMode::Sha512,
];

#[test]
fn test_sha_abc() {
    let (_model, engine) = engine(SeConfig::default());
    assert_eq!(
        hex::encode(hash(&engine, ShaMode::Sha1, &[&b"abc"[..]])),
        "a9993e364706816aba3e25717850c26c9cd0d89d"
    );
    assert_eq!(
        hex::encode(hash(&engine, ShaMode::Sha256, &[&b"abc"[..]])),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(
        hex::encode(hash(&engine, ShaMode::Sha512, &[&b"abc"[..]])),
        "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
         2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
    );
}

#[test]
fn test_sha_all_modes() {
    let (_model, engine) = engine(SeConfig::default());
    for len in [1, 55, 56, 64, 111, 112, 128, 1000] {
        let msg = message(len);
        for mode in ALL_MODES {
            assert_eq!(
                hash(&engine, mode, &[&msg[..]]),
                Sha::hash(algo(mode), &msg),
                "{mode:?} over {len} bytes"
            );
        }
    }
}

#[test]
fn test_sha_larger_than_buffer() {
    let (_model, engine) = engine(small_buffers());
    let msg = message(3 * 2176 + 1000);
    for mode in ALL_MODES {
        assert_eq!(hash(&engine, mode, &[&msg[..]]), Sha::hash(algo(mode), &msg));
    }
}

#[test]
fn test_sha_several_updates() {
    let (_model, engine) = engine(small_buffers());
    let msg = message(5000);
    let digest = hash(
        &engine,
        ShaMode::Sha384,
        &[&msg[..1024], &msg[1024..3072], &msg[3072..]],
    );
    assert_eq!(digest, Sha::hash(ShaAlgo::Sha384, &msg));

    // Empty updates are accepted and change nothing
    let empty: &[u8] = &[];
    let digest = hash(&engine, ShaMode::Sha256, &[empty, &msg[..], empty]);
    assert_eq!(digest, Sha::hash(ShaAlgo::Sha256, &msg));
}

#[test]
fn test_sha_zero_size() {
    let (_model, engine) = engine(SeConfig::default());
    let mut client = SeClient::new(&engine);
    assert_eq!(
        client.select_algorithm(SeAlgorithm::Sha {
            mode: ShaMode::Sha256,
            total_size: 0,
        }),
        Err(SeError::SHA_ZERO_MESSAGE_SIZE)
    );
}

#[test]
fn test_sha_message_overflow() {
    let (_model, engine) = engine(SeConfig::default());
    let mut client = SeClient::new(&engine);
    client
        .select_algorithm(SeAlgorithm::Sha {
            mode: ShaMode::Sha256,
            total_size: 64,
        })
        .unwrap();
    assert_eq!(
        client.sha_update(&[0; 65]),
        Err(SeError::SHA_MESSAGE_OVERFLOW)
    );
}

#[test]
fn test_sha_unaligned_intermediate_chunk() {
    let config = SeConfig {
        semaphore_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let (_model, engine) = engine(config);
    let mut client = SeClient::new(&engine);
    client
        .select_algorithm(SeAlgorithm::Sha {
            mode: ShaMode::Sha256,
            total_size: 300,
        })
        .unwrap();
    assert_eq!(
        client.sha_update(&[0; 100]),
        Err(SeError::SHA_UNALIGNED_CHUNK)
    );
}

#[test]
fn test_sha_bad_digest_size() {
    let (_model, engine) = engine(SeConfig::default());
    let mut client = SeClient::new(&engine);
    client
        .select_algorithm(SeAlgorithm::Sha {
            mode: ShaMode::Sha1,
            total_size: 3,
        })
        .unwrap();
    client.sha_update(b"abc").unwrap();
    let mut digest = [0u8; 32];
    assert_eq!(
        client.sha_final(&mut digest),
        Err(SeError::SHA_INVALID_DIGEST_SIZE)
    );
}

#[test]
fn test_sha_engine_error() {
    let (model, engine) = engine(SeConfig::default());
    let mut knobs = model.knobs();
    knobs.inject_error = true;
    model.set_knobs(knobs);

    let mut client = SeClient::new(&engine);
    client
        .select_algorithm(SeAlgorithm::Sha {
            mode: ShaMode::Sha256,
            total_size: 3,
        })
        .unwrap();
    assert!(client.sha_update(b"abc").is_err());
}

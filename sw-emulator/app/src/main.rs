/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains main entrypoint for the Security Engine emulator. Each
    subcommand brings up an emulated engine, runs one request through the
    driver and prints the result as hex.

--*/

use clap::{arg, value_parser, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;
use tegra_se_drivers::{
    AesKeyInfo, AesMode, ChipFamily, CmacInput, ContextLayout, RngDestination, RngInitMode,
    RngKeySize, RngSource, RsaKeyInfo, RsaOutput, SeAlgorithm, SeClient, SeConfig, SeEngine,
    SeError, SePlatform, ShaMode, CMAC_TAG_SIZE,
};
use tegra_se_hw_model::{new_engine, InitParams, ModelEmulated};

fn se_err(err: SeError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

fn parse_hex(name: &str, value: &str) -> io::Result<Vec<u8>> {
    hex::decode(value).map_err(|err| invalid(format!("--{name}: {err}")))
}

/// Message bytes from `--input <FILE>` or `--data <HEX>`
fn message(args: &ArgMatches) -> io::Result<Vec<u8>> {
    if let Some(path) = args.get_one::<PathBuf>("input") {
        if !path.exists() {
            println!("Input file {:?} does not exist", path);
            exit(-1);
        }
        return fs::read(path);
    }
    match args.get_one::<String>("data") {
        Some(data) => parse_hex("data", data),
        None => Ok(Vec::new()),
    }
}

fn input_args(cmd: Command<'static>) -> Command<'static> {
    cmd.arg(
        arg!(--input <FILE> "Read the message from a file")
            .required(false)
            .value_parser(value_parser!(PathBuf)),
    )
    .arg(
        arg!(--data <HEX> "Message as a hex string")
            .required(false)
            .conflicts_with("input"),
    )
}

fn sha_mode(name: &str) -> io::Result<ShaMode> {
    match name {
        "sha1" => Ok(ShaMode::Sha1),
        "sha224" => Ok(ShaMode::Sha224),
        "sha256" => Ok(ShaMode::Sha256),
        "sha384" => Ok(ShaMode::Sha384),
        "sha512" => Ok(ShaMode::Sha512),
        _ => Err(invalid(format!("unknown hash mode {name}"))),
    }
}

fn aes_mode(name: &str) -> io::Result<AesMode> {
    match name {
        "ecb" => Ok(AesMode::Ecb),
        "cbc" => Ok(AesMode::Cbc),
        "ofb" => Ok(AesMode::Ofb),
        "ctr" => Ok(AesMode::Ctr),
        _ => Err(invalid(format!("unknown cipher mode {name}"))),
    }
}

fn run_sha(engine: &SeEngine<ModelEmulated>, args: &ArgMatches) -> io::Result<Vec<u8>> {
    let mode = sha_mode(args.get_one::<String>("mode").map_or("sha256", |m| m.as_str()))?;
    let msg = message(args)?;

    let mut client = SeClient::new(engine);
    client
        .select_algorithm(SeAlgorithm::Sha {
            mode,
            total_size: msg.len(),
        })
        .map_err(se_err)?;
    client.sha_update(&msg).map_err(se_err)?;
    let mut digest = vec![0u8; mode.digest_size()];
    client.sha_final(&mut digest).map_err(se_err)?;
    Ok(digest)
}

fn run_aes(engine: &SeEngine<ModelEmulated>, args: &ArgMatches) -> io::Result<Vec<u8>> {
    let mode = aes_mode(args.get_one::<String>("mode").map_or("ecb", |m| m.as_str()))?;
    let decrypt = args.get_one::<bool>("decrypt").copied().unwrap_or(false);
    let key = match args.get_one::<String>("key") {
        Some(key) => parse_hex("key", key)?,
        None => Err(invalid("--key is required".into()))?,
    };
    let msg = message(args)?;

    let mut client = SeClient::new(engine);
    client.select_algorithm(SeAlgorithm::Aes).map_err(se_err)?;
    client.aes_select_operation(mode, !decrypt).map_err(se_err)?;
    client
        .aes_select_key(&AesKeyInfo::user(&key))
        .map_err(se_err)?;
    if let Some(iv) = args.get_one::<String>("iv") {
        client.aes_set_iv(&parse_hex("iv", iv)?).map_err(se_err)?;
    }
    let mut out = vec![0u8; msg.len()];
    client.aes_process_buffer(&msg, &mut out).map_err(se_err)?;
    Ok(out)
}

fn run_cmac(engine: &SeEngine<ModelEmulated>, args: &ArgMatches) -> io::Result<Vec<u8>> {
    let use_sbk = args.get_one::<bool>("sbk").copied().unwrap_or(false);
    let key = match args.get_one::<String>("key") {
        Some(key) => parse_hex("key", key)?,
        None if use_sbk => Vec::new(),
        None => Err(invalid("--key or --sbk is required".into()))?,
    };
    let msg = message(args)?;

    let mut client = SeClient::new(engine);
    client.select_algorithm(SeAlgorithm::Aes).map_err(se_err)?;
    client
        .aes_select_operation(AesMode::Cbc, true)
        .map_err(se_err)?;
    if !use_sbk {
        client
            .aes_select_key(&AesKeyInfo::user(&key))
            .map_err(se_err)?;
    }
    let mut tag = vec![0u8; CMAC_TAG_SIZE];
    client
        .aes_compute_cmac(
            &CmacInput {
                data: &msg,
                first_chunk: true,
                last_chunk: true,
                use_sbk,
            },
            Some(&mut tag),
        )
        .map_err(se_err)?;
    Ok(tag)
}

fn run_rsa(engine: &SeEngine<ModelEmulated>, args: &ArgMatches) -> io::Result<Vec<u8>> {
    let hex_arg = |name: &str| match args.get_one::<String>(name) {
        Some(value) => parse_hex(name, value),
        None => Err(invalid(format!("--{name} is required"))),
    };
    let modulus = hex_arg("modulus")?;
    let exponent = hex_arg("exponent")?;
    let msg = message(args)?;

    let key = RsaKeyInfo {
        key_slot: args.get_one::<u32>("slot").copied().unwrap_or(0),
        modulus: &modulus,
        exponent: &exponent,
        output: RsaOutput::Memory,
    };
    let mut client = SeClient::new(engine);
    client.select_algorithm(SeAlgorithm::Rsa).map_err(se_err)?;
    let mut out = vec![0u8; modulus.len()];
    client.rsa_mod_exp(&key, &msg, &mut out).map_err(se_err)?;
    Ok(out)
}

fn run_rng(engine: &SeEngine<ModelEmulated>, args: &ArgMatches) -> io::Result<Vec<u8>> {
    let size = args.get_one::<usize>("size").copied().unwrap_or(16);
    let (mode, source) = if engine.config().chip == ChipFamily::T30 {
        (RngInitMode::Normal, RngSource::Memory)
    } else {
        (RngInitMode::ForceReseed, RngSource::Entropy)
    };

    let mut client = SeClient::new(engine);
    client.select_algorithm(SeAlgorithm::Rng).map_err(se_err)?;
    client
        .rng_set_up_context(mode, RngKeySize::Aes128, source, RngDestination::Memory)
        .map_err(se_err)?;
    let mut out = vec![0u8; size];
    client.rng_generate(&mut out).map_err(se_err)?;
    Ok(out)
}

fn run_suspend(model: &ModelEmulated, engine: &SeEngine<ModelEmulated>) -> io::Result<Vec<u8>> {
    let addr = engine.suspend().map_err(se_err)?;
    let size = ContextLayout::for_chip(engine.config().chip).total_size();
    log::info!("Context of {size} bytes at {addr:#010x}");
    let mut context = vec![0u8; size];
    model.dma_read(addr, &mut context);
    Ok(context)
}

fn cli() -> Command<'static> {
    Command::new("tegra-se-emu")
        .about("Tegra Security Engine emulator")
        .arg(
            arg!(--chip <CHIP> "Chip family of the emulated engine")
                .required(false)
                .value_parser(["t30", "t114"])
                .default_value("t114"),
        )
        .arg(
            arg!(--buffer_size <BYTES> "Size of each driver DMA buffer")
                .required(false)
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--op_timeout <MS> "Deadline of one hardware operation")
                .required(false)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--ctx_save_timeout <MS> "Deadline of one suspend step")
                .required(false)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--semaphore_timeout <MS> "Deadline of the buffer semaphore")
                .required(false)
                .value_parser(value_parser!(u64)),
        )
        .arg(arg!(-v --verbose "Log driver activity").action(ArgAction::SetTrue))
        .subcommand_required(true)
        .subcommand(
            input_args(Command::new("sha").about("Hash a message")).arg(
                arg!(--mode <MODE> "Hash algorithm")
                    .required(false)
                    .value_parser(["sha1", "sha224", "sha256", "sha384", "sha512"])
                    .default_value("sha256"),
            ),
        )
        .subcommand(
            input_args(Command::new("aes").about("Encrypt or decrypt a message"))
                .arg(arg!(--key <HEX> "AES key"))
                .arg(arg!(--iv <HEX> "Initial vector").required(false))
                .arg(
                    arg!(--mode <MODE> "Block cipher mode")
                        .required(false)
                        .value_parser(["ecb", "cbc", "ofb", "ctr"])
                        .default_value("ecb"),
                )
                .arg(arg!(--decrypt "Decrypt instead of encrypt").action(ArgAction::SetTrue)),
        )
        .subcommand(
            input_args(Command::new("cmac").about("Compute an AES-CMAC tag"))
                .arg(arg!(--key <HEX> "AES key").required(false))
                .arg(arg!(--sbk "Use the secure boot key").action(ArgAction::SetTrue)),
        )
        .subcommand(
            input_args(Command::new("rsa").about("Modular exponentiation"))
                .arg(arg!(--modulus <HEX> "Modulus, big-endian"))
                .arg(arg!(--exponent <HEX> "Exponent, big-endian"))
                .arg(
                    arg!(--slot <SLOT> "RSA key slot")
                        .required(false)
                        .value_parser(value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("rng").about("Generate random bytes").arg(
                arg!(--size <BYTES> "Number of bytes")
                    .required(false)
                    .value_parser(value_parser!(usize)),
            ),
        )
        .subcommand(Command::new("suspend").about("Dump the encrypted suspend context"))
}

fn main() -> io::Result<()> {
    let args = cli().get_matches();

    let level = if args.get_one::<bool>("verbose").copied().unwrap_or(false) {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(err) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to set up logging: {err}");
    }

    let chip = match args.get_one::<String>("chip").map(|c| c.as_str()) {
        Some("t30") => ChipFamily::T30,
        _ => ChipFamily::T114,
    };
    let mut config = SeConfig {
        chip,
        ..SeConfig::default()
    };
    if let Some(size) = args.get_one::<usize>("buffer_size") {
        config.buffer_size = *size;
    }
    if let Some(ms) = args.get_one::<u64>("op_timeout") {
        config.op_timeout = Duration::from_millis(*ms);
    }
    if let Some(ms) = args.get_one::<u64>("ctx_save_timeout") {
        config.ctx_save_timeout = Duration::from_millis(*ms);
    }
    if let Some(ms) = args.get_one::<u64>("semaphore_timeout") {
        config.semaphore_timeout = Duration::from_millis(*ms);
    }

    let (model, engine) = new_engine(InitParams::default(), config).map_err(se_err)?;
    let result = match args.subcommand() {
        Some(("sha", sub)) => run_sha(&engine, sub),
        Some(("aes", sub)) => run_aes(&engine, sub),
        Some(("cmac", sub)) => run_cmac(&engine, sub),
        Some(("rsa", sub)) => run_rsa(&engine, sub),
        Some(("rng", sub)) => run_rng(&engine, sub),
        Some(("suspend", _)) => run_suspend(&model, &engine),
        _ => Err(invalid("unknown subcommand".into())),
    };
    engine.deinit();

    match result {
        Ok(bytes) => {
            println!("{}", hex::encode(bytes));
            Ok(())
        }
        Err(err) => {
            println!("Error: {err}");
            exit(-1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert!(matches!(sha_mode("sha384"), Ok(ShaMode::Sha384)));
        assert!(sha_mode("md5").is_err());
        assert!(matches!(aes_mode("ctr"), Ok(AesMode::Ctr)));
        assert!(aes_mode("gcm").is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(cli()
            .try_get_matches_from(["tegra-se-emu", "sha", "--mode", "md5"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["tegra-se-emu", "aes", "--key", "00", "--mode", "xts"])
            .is_err());
        let args = cli()
            .try_get_matches_from(["tegra-se-emu", "sha", "--data", "616263"])
            .unwrap();
        let (name, sub) = args.subcommand().unwrap();
        assert_eq!(name, "sha");
        assert_eq!(sub.get_one::<String>("mode").unwrap(), "sha256");
    }
}

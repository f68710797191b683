/*++

Licensed under the Apache-2.0 license.

File Name:

    client.rs

Abstract:

    File contains the per-client algorithm session. A client selects one
    algorithm and then drives it through the engine.

--*/

use tegra_se_error::{SeError, SeResult};

use crate::aes::{AesKeyInfo, AesMode, AesSession};
use crate::cmac::CmacInput;
use crate::engine::SeEngine;
use crate::platform::SePlatform;
use crate::rng::{RngDestination, RngInitMode, RngKeySize, RngSession, RngSource};
use crate::rsa::{RsaKeyInfo, RsaSession};
use crate::sha::{ShaMode, ShaSession};

/// Algorithm a client can select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeAlgorithm {
    Sha { mode: ShaMode, total_size: usize },
    Aes,
    Rsa,
    Rng,
}

/// State of the selected algorithm
#[derive(Debug)]
pub enum SeSession {
    Sha(ShaSession),
    Aes(AesSession),
    Rsa(Option<RsaSession>),
    Rng(RngSession),
}

/// One user of the engine.
///
/// Dropping the client releases any key slot its AES session holds.
pub struct SeClient<'e, P: SePlatform> {
    engine: &'e SeEngine<P>,
    session: Option<SeSession>,
}

macro_rules! session_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&mut self) -> SeResult<&mut $ty> {
            match self.session.as_mut() {
                Some(SeSession::$variant(session)) => Ok(session),
                Some(_) => Err(SeError::CLIENT_WRONG_ALGORITHM),
                None => Err(SeError::CLIENT_NO_ALGORITHM),
            }
        }
    };
}

impl<'e, P: SePlatform> SeClient<'e, P> {
    pub fn new(engine: &'e SeEngine<P>) -> Self {
        Self {
            engine,
            session: None,
        }
    }

    /// Replace the current session with a fresh one for `algorithm`
    pub fn select_algorithm(&mut self, algorithm: SeAlgorithm) -> SeResult<()> {
        let session = match algorithm {
            SeAlgorithm::Sha { mode, total_size } => {
                SeSession::Sha(ShaSession::new(mode, total_size)?)
            }
            SeAlgorithm::Aes => SeSession::Aes(AesSession::new()),
            SeAlgorithm::Rsa => SeSession::Rsa(None),
            SeAlgorithm::Rng => SeSession::Rng(RngSession::new()),
        };
        self.release_session();
        self.session = Some(session);
        Ok(())
    }

    pub fn session(&self) -> Option<&SeSession> {
        self.session.as_ref()
    }

    session_accessor!(sha, Sha, ShaSession);
    session_accessor!(aes, Aes, AesSession);
    session_accessor!(rng, Rng, RngSession);

    pub fn sha_update(&mut self, data: &[u8]) -> SeResult<()> {
        let engine = self.engine;
        engine.sha_update(self.sha()?, data)
    }

    pub fn sha_final(&mut self, digest: &mut [u8]) -> SeResult<()> {
        self.sha()?.finalize(digest)
    }

    pub fn aes_select_operation(&mut self, mode: AesMode, encrypt: bool) -> SeResult<()> {
        self.aes()?.select_operation(mode, encrypt)
    }

    pub fn aes_select_key(&mut self, info: &AesKeyInfo) -> SeResult<()> {
        let engine = self.engine;
        engine.aes_select_key(self.aes()?, info)
    }

    pub fn aes_release_key_slot(&mut self) -> SeResult<()> {
        let engine = self.engine;
        engine.aes_release_key_slot(self.aes()?)
    }

    pub fn aes_process_buffer(&mut self, src: &[u8], dst: &mut [u8]) -> SeResult<()> {
        let engine = self.engine;
        engine.aes_process_buffer(self.aes()?, src, dst)
    }

    pub fn aes_set_iv(&mut self, iv: &[u8]) -> SeResult<()> {
        let engine = self.engine;
        engine.aes_set_iv(self.aes()?, iv)
    }

    pub fn aes_get_iv(&mut self, iv: &mut [u8]) -> SeResult<()> {
        let engine = self.engine;
        engine.aes_get_iv(self.aes()?, iv)
    }

    pub fn aes_initial_vector(&mut self, iv: &mut [u8]) -> SeResult<()> {
        self.aes()?.initial_vector(iv)
    }

    pub fn aes_compute_cmac(
        &mut self,
        input: &CmacInput,
        output: Option<&mut [u8]>,
    ) -> SeResult<()> {
        let engine = self.engine;
        engine.aes_compute_cmac(self.aes()?, input, output)
    }

    pub fn aes_clear_secure_boot_key(&mut self) -> SeResult<()> {
        self.aes()?;
        self.engine.aes_clear_secure_boot_key()
    }

    pub fn aes_lock_secure_storage_key(&mut self) -> SeResult<()> {
        self.aes()?;
        self.engine.aes_lock_secure_storage_key()
    }

    pub fn aes_set_and_lock_secure_storage_key(&mut self, key: &[u8; 16]) -> SeResult<()> {
        self.aes()?;
        self.engine.aes_set_and_lock_secure_storage_key(key)
    }

    pub fn aes_write_lock_key_slot(&mut self, slot: u32) -> SeResult<()> {
        self.aes()?;
        self.engine.aes_write_lock_key_slot(slot)
    }

    pub fn rsa_mod_exp(
        &mut self,
        key: &RsaKeyInfo,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<()> {
        match self.session {
            Some(SeSession::Rsa(ref mut last)) => {
                *last = Some(self.engine.rsa_mod_exp(key, input, output)?);
                Ok(())
            }
            Some(_) => Err(SeError::CLIENT_WRONG_ALGORITHM),
            None => Err(SeError::CLIENT_NO_ALGORITHM),
        }
    }

    pub fn rng_set_up_context(
        &mut self,
        mode: RngInitMode,
        key_size: RngKeySize,
        source: RngSource,
        dest: RngDestination,
    ) -> SeResult<()> {
        let engine = self.engine;
        engine.rng_set_up_context(self.rng()?, mode, key_size, source, dest)
    }

    pub fn rng_generate(&mut self, out: &mut [u8]) -> SeResult<()> {
        let engine = self.engine;
        engine.rng_generate(self.rng()?, out)
    }

    fn release_session(&mut self) {
        if let Some(SeSession::Aes(session)) = self.session.as_mut() {
            if let Err(err) = self.engine.aes_release_key_slot(session) {
                log::warn!("Failed to release AES key slot: {err}");
            }
        }
        self.session = None;
    }
}

impl<P: SePlatform> Drop for SeClient<'_, P> {
    fn drop(&mut self) {
        self.release_session();
    }
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the Security Engine emulator peripheral library.

--*/

mod pmc;
mod root_bus;
mod security_engine;

pub use pmc::Pmc;
pub use root_bus::{SeRootBus, PMC_BASE, RAM_BASE, SE_BASE};
pub use security_engine::{SeKnobs, SecurityEngine, NUM_KEY_SLOTS};

/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the Security Engine emulator bus library.

--*/
mod bus;
mod mem;
mod ram;

pub use crate::bus::{Bus, BusError};
pub use crate::mem::{Mem, MemError};
pub use crate::ram::Ram;

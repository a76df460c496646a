// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]
//! This library provides emulation of the gameboy's Z80-like CPU and it's peripherals,
//! as described in the publicly available "Game Boy CPU Manual".

#[cfg(any(test, feature = "debug"))]
#[macro_use]
extern crate std;
extern crate core;
// The alloc crate is optional, and used for allocating the cartridge controller's
// ram on the heap.
#[cfg(feature = "alloc")]
extern crate alloc;

pub mod bus;
pub mod cpu;
pub mod config;
pub mod emulator;

use core::fmt;

/// The library's exported errors.
///
/// Bus faults and opcode faults are the two fatal categories from the
/// machine's point of view: a Frontend that receives either of these from
/// [`emulator::Emulator::run_frame`] should report it and stop, per the
/// `fatal_error` contract.
pub enum GameboyError {
	/// Unimplemented feature error.
	NotImplemented,
	/// Cartridge operation error (unsupported mapper, malformed save blob, ...).
	Cartridge(&'static str),
	/// Generic IO related error.
	Io(&'static str),
	/// A read or write hit an address not mapped by the active peripheral set.
	BadAddress(u16),
	/// One of the eleven unused/illegal LR35902 opcodes was fetched.
	BadOpcode(u8),
	/// Invalid value written to a register.
	BadValue(u8),
}

impl fmt::Display for GameboyError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			GameboyError::NotImplemented => write!(f, "Not implemented"),
            GameboyError::Cartridge(ref info) => write!(f, "Cartridge error: {}", info),
            GameboyError::Io(ref info) => write!(f, "IO error: {}", info),
            GameboyError::BadAddress(address) => write!(f, "Bad address: 0x{:x}", address),
            GameboyError::BadOpcode(value) => write!(f, "Bad opcode: 0x{:x}", value),
            GameboyError::BadValue(value) => write!(f, "Bad value: {}", value),
        }
	}
}

impl fmt::Debug for GameboyError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		(self as &dyn fmt::Display).fmt(f)
	}
}

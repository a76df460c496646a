// Copyright 2021 Nir H. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
//! Gameboy cpu's arithmetic and logic unit.
//!
//! Every function here only computes a result and sets the relevant flags on
//! `cpu.registers`; callers are responsible for storing the result back into
//! a register or memory location and for charging the right number of cycles.

use super::Cpu;
use super::state::registers::{Flag, Register};
use crate::GameboyError;

type InsnResult = Result<usize, GameboyError>;

/// Implementation of 8-bit arithmetic and logic operations.
pub mod alu8 {
	use super::*;

	fn set_zn_flags(cpu: &mut Cpu, result: u8, subtract: bool) {
		cpu.registers.set_flag(Flag::Z, result == 0);
		cpu.registers.set_flag(Flag::N, subtract);
	}

	/// `ADD A, n`: adds the given arguments, sets the relevant flags and
	/// returns the result.
	pub fn add(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let result = lhs.wrapping_add(rhs);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, (lhs & 0xF) + (rhs & 0xF) > 0xF);
		cpu.registers.set_flag(Flag::C, (lhs as u16) + (rhs as u16) > 0xFF);

		result
	}

	/// `ADC A, n`: adds the arguments and the current carry flag.
	pub fn adc(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let carry: u8 = cpu.registers.flag(Flag::C) as u8;
		let result = lhs.wrapping_add(rhs).wrapping_add(carry);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, (lhs & 0xF) + (rhs & 0xF) + carry > 0xF);
		cpu.registers.set_flag(Flag::C, (lhs as u16) + (rhs as u16) + (carry as u16) > 0xFF);

		result
	}

	/// `SUB n`: subtracts `rhs` from `lhs`.
	pub fn sub(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let result = lhs.wrapping_sub(rhs);

		set_zn_flags(cpu, result, true);
		cpu.registers.set_flag(Flag::H, (lhs & 0xF) < (rhs & 0xF));
		cpu.registers.set_flag(Flag::C, (lhs as u16) < (rhs as u16));

		result
	}

	/// `SBC A, n`: subtracts `rhs` and the carry flag from `lhs`.
	pub fn sbc(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let carry: u8 = cpu.registers.flag(Flag::C) as u8;
		let result = lhs.wrapping_sub(rhs).wrapping_sub(carry);

		set_zn_flags(cpu, result, true);
		cpu.registers.set_flag(Flag::H, (lhs & 0xF) < (rhs & 0xF) + carry);
		cpu.registers.set_flag(Flag::C, (lhs as u16) < (rhs as u16) + (carry as u16));

		result
	}

	/// `CP n`: computes `lhs - rhs` for the flags only. Returns `lhs`
	/// unchanged so it shares a signature with the other `op_*` helpers
	/// below without a caller accidentally clobbering `A`.
	pub fn cp(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		sub(cpu, lhs, rhs);
		lhs
	}

	/// `AND n`.
	pub fn and(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let result = lhs & rhs;

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, true);
		cpu.registers.set_flag(Flag::C, false);

		result
	}

	/// `XOR n`.
	pub fn xor(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let result = lhs ^ rhs;

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, false);

		result
	}

	/// `OR n`.
	pub fn or(cpu: &mut Cpu, lhs: u8, rhs: u8) -> u8 {
		let result = lhs | rhs;

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, false);

		result
	}

	/// `INC r`: increments by one. Unlike `ADD` this never touches the
	/// carry flag.
	pub fn inc(cpu: &mut Cpu, value: u8) -> u8 {
		let result = value.wrapping_add(1);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, (value & 0xF) == 0xF);

		result
	}

	/// `DEC r`: decrements by one. Unlike `SUB` this never touches the
	/// carry flag.
	pub fn dec(cpu: &mut Cpu, value: u8) -> u8 {
		let result = value.wrapping_sub(1);

		set_zn_flags(cpu, result, true);
		cpu.registers.set_flag(Flag::H, (value & 0xF) == 0);

		result
	}

	/// `DAA`: corrects `A` into packed BCD following the previous
	/// add/subtract operation, using N/H/C to know which correction applies.
	pub fn daa(cpu: &mut Cpu, value: u8) -> u8 {
		let mut result = value;
		let subtract = cpu.registers.flag(Flag::N);
		let mut carry = cpu.registers.flag(Flag::C);

		if !subtract {
			if carry || result > 0x99 {
				result = result.wrapping_add(0x60);
				carry = true;
			}
			if cpu.registers.flag(Flag::H) || (result & 0x0F) > 0x09 {
				result = result.wrapping_add(0x06);
			}
		} else {
			if carry {
				result = result.wrapping_sub(0x60);
			}
			if cpu.registers.flag(Flag::H) {
				result = result.wrapping_sub(0x06);
			}
		}

		cpu.registers.set_flag(Flag::Z, result == 0);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `CPL`: bitwise complement of `A`.
	pub fn cpl(cpu: &mut Cpu, value: u8) -> u8 {
		cpu.registers.set_flag(Flag::N, true);
		cpu.registers.set_flag(Flag::H, true);

		!value
	}

	/// `SCF`: sets the carry flag.
	pub fn scf(cpu: &mut Cpu) {
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, true);
	}

	/// `CCF`: complements the carry flag.
	pub fn ccf(cpu: &mut Cpu) {
		let carry = cpu.registers.flag(Flag::C);

		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, !carry);
	}

	/// Rotates `value` left, `A`-style: `Z` is always cleared regardless
	/// of the result (used by `RLCA`).
	pub fn rlca(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x80) != 0;
		let result = value.rotate_left(1);

		cpu.registers.set_flag(Flag::Z, false);
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `RRCA`.
	pub fn rrca(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x01) != 0;
		let result = value.rotate_right(1);

		cpu.registers.set_flag(Flag::Z, false);
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `RLA`: rotates left through the carry flag.
	pub fn rla(cpu: &mut Cpu, value: u8) -> u8 {
		let old_carry = cpu.registers.flag(Flag::C) as u8;
		let new_carry = (value & 0x80) != 0;
		let result = (value << 1) | old_carry;

		cpu.registers.set_flag(Flag::Z, false);
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, new_carry);

		result
	}

	/// `RRA`: rotates right through the carry flag.
	pub fn rra(cpu: &mut Cpu, value: u8) -> u8 {
		let old_carry = cpu.registers.flag(Flag::C) as u8;
		let new_carry = (value & 0x01) != 0;
		let result = (value >> 1) | (old_carry << 7);

		cpu.registers.set_flag(Flag::Z, false);
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, new_carry);

		result
	}

	/// `RLC r`: rotate left, CB-prefixed form (`Z` reflects the result).
	pub fn rlc(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x80) != 0;
		let result = value.rotate_left(1);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `RRC r`.
	pub fn rrc(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x01) != 0;
		let result = value.rotate_right(1);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `RL r`.
	pub fn rl(cpu: &mut Cpu, value: u8) -> u8 {
		let old_carry = cpu.registers.flag(Flag::C) as u8;
		let new_carry = (value & 0x80) != 0;
		let result = (value << 1) | old_carry;

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, new_carry);

		result
	}

	/// `RR r`.
	pub fn rr(cpu: &mut Cpu, value: u8) -> u8 {
		let old_carry = cpu.registers.flag(Flag::C) as u8;
		let new_carry = (value & 0x01) != 0;
		let result = (value >> 1) | (old_carry << 7);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, new_carry);

		result
	}

	/// `SLA r`: arithmetic shift left.
	pub fn sla(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x80) != 0;
		let result = value << 1;

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `SRA r`: arithmetic shift right (preserves bit 7).
	pub fn sra(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x01) != 0;
		let result = (value >> 1) | (value & 0x80);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `SWAP r`: swaps the low and high nibbles.
	pub fn swap(cpu: &mut Cpu, value: u8) -> u8 {
		let result = (value << 4) | (value >> 4);

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, false);

		result
	}

	/// `SRL r`: logical shift right.
	pub fn srl(cpu: &mut Cpu, value: u8) -> u8 {
		let carry = (value & 0x01) != 0;
		let result = value >> 1;

		set_zn_flags(cpu, result, false);
		cpu.registers.set_flag(Flag::H, false);
		cpu.registers.set_flag(Flag::C, carry);

		result
	}

	/// `BIT b, r`: tests bit `bit` of `value`. Leaves `C` untouched.
	pub fn bit(cpu: &mut Cpu, value: u8, bit: u8) {
		let is_zero = (value & (1 << bit)) == 0;

		cpu.registers.set_flag(Flag::Z, is_zero);
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, true);
	}

	/// `RES b, r`: clears bit `bit`. No flags are affected.
	pub fn res(value: u8, bit: u8) -> u8 {
		value & !(1 << bit)
	}

	/// `SET b, r`: sets bit `bit`. No flags are affected.
	pub fn set(value: u8, bit: u8) -> u8 {
		value | (1 << bit)
	}

	/// Applies an `A op= src` instruction and stores the result back into
	/// `dst` (a no-op store for [`cp`], which returns its left-hand side
	/// unchanged).
	pub fn op_registers(op: fn(&mut Cpu, u8, u8) -> u8,
						cpu: &mut Cpu,
						dst: Register,
						src: Register) -> InsnResult {
		let lhs = cpu.registers.get(dst) as u8;
		let rhs = cpu.registers.get(src) as u8;
		let result = op(cpu, lhs, rhs);

		cpu.registers.set(dst, result as u16);

		Ok(4)
	}

	/// Applies an `A op= (HL)` instruction.
	pub fn op_mem(op: fn(&mut Cpu, u8, u8) -> u8, cpu: &mut Cpu) -> InsnResult {
		let lhs = cpu.registers.get(Register::A) as u8;
		let address = cpu.registers.get(Register::HL);
		let rhs: u8 = cpu.mmap.read(address)?;
		let result = op(cpu, lhs, rhs);

		cpu.registers.set(Register::A, result as u16);

		Ok(8)
	}

	/// Applies an `A op= n` instruction, fetching the immediate operand.
	pub fn op_imm(op: fn(&mut Cpu, u8, u8) -> u8, cpu: &mut Cpu) -> InsnResult {
		let lhs = cpu.registers.get(Register::A) as u8;
		let rhs: u8 = cpu.fetch()?;
		let result = op(cpu, lhs, rhs);

		cpu.registers.set(Register::A, result as u16);

		Ok(8)
	}

	/// `INC r`.
	pub fn inc_register(cpu: &mut Cpu, reg: Register) -> InsnResult {
		let value = cpu.registers.get(reg) as u8;
		let result = inc(cpu, value);

		cpu.registers.set(reg, result as u16);

		Ok(4)
	}

	/// `DEC r`.
	pub fn dec_register(cpu: &mut Cpu, reg: Register) -> InsnResult {
		let value = cpu.registers.get(reg) as u8;
		let result = dec(cpu, value);

		cpu.registers.set(reg, result as u16);

		Ok(4)
	}

	/// `INC (HL)`.
	pub fn inc_mem(cpu: &mut Cpu) -> InsnResult {
		let address = cpu.registers.get(Register::HL);
		let value = cpu.mmap.read(address)?;
		let result = inc(cpu, value);

		cpu.mmap.write(address, result)?;

		Ok(12)
	}

	/// `DEC (HL)`.
	pub fn dec_mem(cpu: &mut Cpu) -> InsnResult {
		let address = cpu.registers.get(Register::HL);
		let value = cpu.mmap.read(address)?;
		let result = dec(cpu, value);

		cpu.mmap.write(address, result)?;

		Ok(12)
	}

	/// Applies a unary CB-prefixed operation (rotate/shift/swap) to a
	/// register and stores the result back.
	pub fn apply_register_op(cpu: &mut Cpu,
							 op: fn(&mut Cpu, u8) -> u8,
							 reg: Register) -> InsnResult {
		let value = cpu.registers.get(reg) as u8;
		let result = op(cpu, value);

		cpu.registers.set(reg, result as u16);

		Ok(8)
	}

	/// Applies a unary CB-prefixed operation to `(HL)`.
	pub fn apply_memory_op(cpu: &mut Cpu, op: fn(&mut Cpu, u8) -> u8) -> InsnResult {
		let address = cpu.registers.get(Register::HL);
		let value = cpu.mmap.read(address)?;
		let result = op(cpu, value);

		cpu.mmap.write(address, result)?;

		Ok(16)
	}

	/// `BIT b, r`.
	pub fn test_register_bit(cpu: &mut Cpu, reg: Register, n: u8) -> InsnResult {
		let value = cpu.registers.get(reg) as u8;
		bit(cpu, value, n);

		Ok(8)
	}

	/// `BIT b, (HL)`.
	pub fn test_memory_bit(cpu: &mut Cpu, n: u8) -> InsnResult {
		let address = cpu.registers.get(Register::HL);
		let value = cpu.mmap.read(address)?;
		bit(cpu, value, n);

		Ok(16)
	}

	/// `RES b, r` / `SET b, r`.
	pub fn apply_register_bit(cpu: &mut Cpu,
							  op: fn(u8, u8) -> u8,
							  reg: Register,
							  n: u8) -> InsnResult {
		let value = cpu.registers.get(reg) as u8;
		cpu.registers.set(reg, op(value, n) as u16);

		Ok(8)
	}

	/// `RES b, (HL)` / `SET b, (HL)`.
	pub fn apply_memory_bit(cpu: &mut Cpu, op: fn(u8, u8) -> u8, n: u8) -> InsnResult {
		let address = cpu.registers.get(Register::HL);
		let value = cpu.mmap.read(address)?;
		cpu.mmap.write(address, op(value, n))?;

		Ok(16)
	}
}

/// Implementation of 16-bit arithmetic operations.
pub mod alu16 {
	use super::*;

	/// `ADD HL, rr`: Z is left untouched.
	pub fn add(cpu: &mut Cpu, lhs: u16, rhs: u16) -> u16 {
		let result = lhs.wrapping_add(rhs);

		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, (lhs & 0x0FFF) + (rhs & 0x0FFF) > 0x0FFF);
		cpu.registers.set_flag(Flag::C, (lhs as u32) + (rhs as u32) > 0xFFFF);

		result
	}

	/// `ADD HL, rr` applied directly to a pair of registers.
	pub fn add_to_hl(cpu: &mut Cpu, rhs: Register) -> InsnResult {
		let lhs = cpu.registers.get(Register::HL);
		let rhs = cpu.registers.get(rhs);
		let result = add(cpu, lhs, rhs);

		cpu.registers.set(Register::HL, result);

		Ok(8)
	}

	/// `INC rr`: 16-bit increment/decrement never touch any flag.
	pub fn inc_register(cpu: &mut Cpu, reg: Register) -> InsnResult {
		let value = cpu.registers.get(reg);
		cpu.registers.set(reg, value.wrapping_add(1));

		Ok(8)
	}

	/// `DEC rr`.
	pub fn dec_register(cpu: &mut Cpu, reg: Register) -> InsnResult {
		let value = cpu.registers.get(reg);
		cpu.registers.set(reg, value.wrapping_sub(1));

		Ok(8)
	}

	/// Shared implementation of `ADD SP, e8` and `LD HL, SP+e8`: both add a
	/// signed byte to `SP` and compute `H`/`C` from the *unsigned* low-byte
	/// addition, with `Z` and `N` always cleared.
	pub fn add_sp_e8(cpu: &mut Cpu, sp: u16, offset: i8) -> u16 {
		let unsigned_offset = offset as u8;
		let result = sp.wrapping_add((offset as i16) as u16);

		cpu.registers.set_flag(Flag::Z, false);
		cpu.registers.set_flag(Flag::N, false);
		cpu.registers.set_flag(Flag::H, ((sp as u8) & 0x0F) + (unsigned_offset & 0x0F) > 0x0F);
		cpu.registers.set_flag(Flag::C, ((sp & 0xFF) as u16) + (unsigned_offset as u16) > 0xFF);

		result
	}
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod tests {
	use super::*;
	use crate::cpu::tests::with_cpu;

	#[test]
	fn test_memory_bit() {
		with_cpu(|cpu| {
			let address = 0xC000;
			cpu.registers.set(Register::HL, address);
			cpu.mmap.write(address, 0x00)?;

			let cost = alu8::test_memory_bit(cpu, 3)?;

			// BIT n, (HL) is a read-only CB op, but still costs 16 T-cycles.
			assert!(cost == 16);
			assert!(cpu.registers.flag(Flag::Z));
			assert!(cpu.mmap.read(address)? == 0x00);

			Ok(())
		}).unwrap();
	}
}

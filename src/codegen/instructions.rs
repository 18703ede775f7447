//! x86-64 instruction encoders.
//!
//! Covers the fixed instruction subset codegen lowers to: register moves,
//! stack push/pop, arithmetic, comparison, unconditional/conditional
//! relative jumps, `ret`, and `syscall`. All forms use the standard
//! REX.W-prefixed 64-bit encoding; no legacy 32-bit forms are emitted.

use super::buffer::CodeBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
}

impl Reg {
    fn code(self) -> u8 {
        match self {
            Reg::Rax => 0,
            Reg::Rcx => 1,
            Reg::Rdx => 2,
            Reg::Rbx => 3,
            Reg::Rsp => 4,
            Reg::Rbp => 5,
            Reg::Rsi => 6,
            Reg::Rdi => 7,
        }
    }

    /// AT&T-syntax operand text, e.g. `%rax`.
    fn att(self) -> &'static str {
        match self {
            Reg::Rax => "%rax",
            Reg::Rcx => "%rcx",
            Reg::Rdx => "%rdx",
            Reg::Rbx => "%rbx",
            Reg::Rsp => "%rsp",
            Reg::Rbp => "%rbp",
            Reg::Rsi => "%rsi",
            Reg::Rdi => "%rdi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Cond {
    fn tttn(self) -> u8 {
        match self {
            Cond::Eq => 0x84,
            Cond::NotEq => 0x85,
            Cond::Lt => 0x8c,
            Cond::LtEq => 0x8e,
            Cond::Gt => 0x8f,
            Cond::GtEq => 0x8d,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "je",
            Cond::NotEq => "jne",
            Cond::Lt => "jl",
            Cond::LtEq => "jle",
            Cond::Gt => "jg",
            Cond::GtEq => "jge",
        }
    }
}

/// REX prefix with the W (64-bit operand) bit always set; all registers
/// used here are in the low 3-bit range (no r8-r15), so R/X/B stay clear.
const REX_W: u8 = 0x48;

fn modrm(md: u8, reg: Reg, rm: Reg) -> u8 {
    (md << 6) | (reg.code() << 3) | rm.code()
}

pub fn mov_reg_imm64(buf: &mut CodeBuffer, dst: Reg, imm: i64) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0xb8 + dst.code());
    buf.emit_i64(imm);
    buf.emit_asm(format!("mov ${}, {}", imm, dst.att()));
}

pub fn mov_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x89);
    buf.emit_u8(modrm(0b11, src, dst));
    buf.emit_asm(format!("mov {}, {}", src.att(), dst.att()));
}

/// `mov [rbp + disp], src` — stores a local. `disp` is typically negative.
pub fn mov_mem_rbp_reg(buf: &mut CodeBuffer, disp: i32, src: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x89);
    buf.emit_u8(modrm(0b10, src, Reg::Rbp));
    buf.emit_i32(disp);
    buf.emit_asm(format!("mov {}, {}(%rbp)", src.att(), disp));
}

/// `mov dst, [rbp + disp]` — loads a local.
pub fn mov_reg_mem_rbp(buf: &mut CodeBuffer, dst: Reg, disp: i32) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x8b);
    buf.emit_u8(modrm(0b10, dst, Reg::Rbp));
    buf.emit_i32(disp);
    buf.emit_asm(format!("mov {}(%rbp), {}", disp, dst.att()));
}

pub fn push_reg(buf: &mut CodeBuffer, reg: Reg) {
    buf.emit_u8(0x50 + reg.code());
    buf.emit_asm(format!("push {}", reg.att()));
}

pub fn pop_reg(buf: &mut CodeBuffer, reg: Reg) {
    buf.emit_u8(0x58 + reg.code());
    buf.emit_asm(format!("pop {}", reg.att()));
}

pub fn add_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x01);
    buf.emit_u8(modrm(0b11, src, dst));
    buf.emit_asm(format!("add {}, {}", src.att(), dst.att()));
}

pub fn sub_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x29);
    buf.emit_u8(modrm(0b11, src, dst));
    buf.emit_asm(format!("sub {}, {}", src.att(), dst.att()));
}

pub fn imul_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x0f);
    buf.emit_u8(0xaf);
    buf.emit_u8(modrm(0b11, dst, src));
    buf.emit_asm(format!("imul {}, {}", src.att(), dst.att()));
}

pub fn xor_reg_reg(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x31);
    buf.emit_u8(modrm(0b11, src, dst));
    buf.emit_asm(format!("xor {}, {}", src.att(), dst.att()));
}

pub fn cmp_reg_reg(buf: &mut CodeBuffer, lhs: Reg, rhs: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x39);
    buf.emit_u8(modrm(0b11, rhs, lhs));
    buf.emit_asm(format!("cmp {}, {}", rhs.att(), lhs.att()));
}

/// Sign-extends `rax` into `rdx:rax` (`cqo`), required before `idiv`.
pub fn cqo(buf: &mut CodeBuffer) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0x99);
    buf.emit_asm("cqo");
}

/// Signed division: `rdx:rax / divisor`, quotient in `rax`, remainder in `rdx`.
pub fn idiv_reg(buf: &mut CodeBuffer, divisor: Reg) {
    buf.emit_u8(REX_W);
    buf.emit_u8(0xf7);
    buf.emit_u8(modrm(0b11, Reg::Rdi, divisor)); // reg field 7 selects /7 (idiv)
    buf.emit_asm(format!("idiv {}", divisor.att()));
}

pub fn ret(buf: &mut CodeBuffer) {
    buf.emit_u8(0xc3);
    buf.emit_asm("ret");
}

pub fn syscall(buf: &mut CodeBuffer) {
    buf.emit_u8(0x0f);
    buf.emit_u8(0x05);
    buf.emit_asm("syscall");
}

/// Unconditional relative jump to `label`, patched once the label is placed.
pub fn jmp(buf: &mut CodeBuffer, label: &str) {
    buf.emit_u8(0xe9);
    buf.emit_patch(label);
    buf.emit_asm(format!("jmp {}", label));
}

/// Conditional relative jump (near form, 6 bytes) to `label`.
pub fn jcc(buf: &mut CodeBuffer, cond: Cond, label: &str) {
    buf.emit_u8(0x0f);
    buf.emit_u8(cond.tttn());
    buf.emit_patch(label);
    buf.emit_asm(format!("{} {}", cond.mnemonic(), label));
}

/// Relative call to `label`.
pub fn call(buf: &mut CodeBuffer, label: &str) {
    buf.emit_u8(0xe8);
    buf.emit_patch(label);
    buf.emit_asm(format!("call {}", label));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_imm64_emits_rex_w_opcode_and_little_endian_immediate() {
        let mut buf = CodeBuffer::new();
        mov_reg_imm64(&mut buf, Reg::Rax, 42);
        assert_eq!(buf.bytes()[0], REX_W);
        assert_eq!(buf.bytes()[1], 0xb8);
        assert_eq!(&buf.bytes()[2..10], &42i64.to_le_bytes());
    }

    #[test]
    fn push_pop_use_compact_single_byte_opcodes() {
        let mut buf = CodeBuffer::new();
        push_reg(&mut buf, Reg::Rbp);
        pop_reg(&mut buf, Reg::Rbx);
        assert_eq!(buf.bytes(), &[0x55, 0x5b]);
    }

    #[test]
    fn jcc_reserves_six_bytes_for_the_near_form() {
        let mut buf = CodeBuffer::new();
        let label = buf.fresh_label("else");
        let start = buf.offset();
        jcc(&mut buf, Cond::Eq, &label);
        assert_eq!(buf.offset() - start, 6);
    }
}

//! Emit-buffer + patch list.
//!
//! A growable byte sequence with a label table (`label name -> byte
//! offset`) and a list of pending relocations. A forward jump is emitted
//! as an opcode followed by a 4-byte placeholder displacement, with the
//! `(patch offset, target label)` pair recorded; once the label's offset
//! is known `resolve` walks the patch list and backfills every
//! displacement in one pass, rather than assembling the buffer twice.

use std::collections::HashMap;

pub struct CodeBuffer {
    bytes: Vec<u8>,
    labels: HashMap<String, usize>,
    patches: Vec<(usize, String)>,
    label_counter: usize,
    /// Mirrors every instruction as a GNU-as text line, in emission order.
    /// Every instruction encoder in `instructions.rs` appends here too, so
    /// the ELF path and the kernel (`.s`) path lower from one pass instead
    /// of risking the two backends drifting apart.
    asm_lines: Vec<String>,
}

impl Default for CodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuffer {
    pub fn new() -> Self {
        CodeBuffer {
            bytes: Vec::new(),
            labels: HashMap::new(),
            patches: Vec::new(),
            label_counter: 0,
            asm_lines: Vec::new(),
        }
    }

    pub fn emit_asm(&mut self, line: impl Into<String>) {
        self.asm_lines.push(line.into());
    }

    pub fn asm_lines(&self) -> &[String] {
        &self.asm_lines
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn emit_u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn emit_bytes(&mut self, bs: &[u8]) {
        self.bytes.extend_from_slice(bs);
    }

    pub fn emit_i32(&mut self, v: i32) {
        self.emit_bytes(&v.to_le_bytes());
    }

    pub fn emit_i64(&mut self, v: i64) {
        self.emit_bytes(&v.to_le_bytes());
    }

    /// Allocates a fresh label name, distinct from any source-level identifier.
    pub fn fresh_label(&mut self, hint: &str) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("L{}_{}", n, hint)
    }

    /// Binds `label` to the buffer's current offset.
    pub fn place_label(&mut self, label: &str) {
        self.labels.insert(label.to_string(), self.offset());
        self.emit_asm(format!("{}:", label));
    }

    pub fn label_offset(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Emits a 4-byte placeholder displacement and records a patch against
    /// `label`, to be backfilled once the label's offset is known.
    pub fn emit_patch(&mut self, label: &str) {
        let at = self.offset();
        self.patches.push((at, label.to_string()));
        self.emit_i32(0);
    }

    /// Backfills every recorded patch with `target_offset - (patch_offset + 4)`,
    /// the standard rel32 displacement relative to the byte after the field.
    /// Returns an error listing any label that was never placed.
    pub fn resolve(&mut self) -> Result<(), Vec<String>> {
        let mut missing = Vec::new();
        for (patch_offset, label) in &self.patches {
            let Some(target) = self.labels.get(label).copied() else {
                missing.push(label.clone());
                continue;
            };
            let rel = target as i64 - (*patch_offset as i64 + 4);
            let rel = rel as i32;
            self.bytes[*patch_offset..*patch_offset + 4].copy_from_slice(&rel.to_le_bytes());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_jump_patches_to_correct_displacement() {
        let mut buf = CodeBuffer::new();
        let label = buf.fresh_label("end");
        buf.emit_u8(0xe9); // jmp rel32
        buf.emit_patch(&label);
        buf.emit_u8(0x90); // nop, padding before target
        buf.place_label(&label);
        buf.resolve().unwrap();

        let rel = i32::from_le_bytes(buf.bytes()[1..5].try_into().unwrap());
        assert_eq!(rel, 1); // one nop byte between the patch field and the label
    }

    #[test]
    fn unresolved_label_is_reported() {
        let mut buf = CodeBuffer::new();
        buf.emit_u8(0xe9);
        buf.emit_patch("never_placed");
        let err = buf.resolve().unwrap_err();
        assert_eq!(err, vec!["never_placed".to_string()]);
    }

    #[test]
    fn fresh_labels_are_distinct() {
        let mut buf = CodeBuffer::new();
        let a = buf.fresh_label("if");
        let b = buf.fresh_label("if");
        assert_ne!(a, b);
    }
}

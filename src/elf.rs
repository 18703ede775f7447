//! ELF64 executable writer.
//!
//! Produces a statically linked, position-dependent `ET_EXEC` binary for
//! `EM_X86_64`: one `PT_LOAD` segment with `PF_R | PF_X`, the code bytes
//! immediately following the headers, and a minimal `.text`/`.shstrtab`
//! section header pair purely for `readelf`/`objdump` debuggability (the
//! kernel doesn't consult section headers to run the binary).

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const EI_NIDENT: usize = 16;
const ET_EXEC: u16 = 2;
const EM_X86_64: u16 = 62;
const EV_CURRENT: u32 = 1;
const PT_LOAD: u32 = 1;
const PF_X: u32 = 1;
const PF_R: u32 = 4;
const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const PAGE_SIZE: u64 = 0x1000;
const BASE_VADDR: u64 = 0x400000;
const EHDR_SIZE: u64 = 64;
const PHDR_SIZE: u64 = 56;
const SHDR_SIZE: u64 = 64;

/// Builds an ELF64 executable image from already-generated machine code,
/// with `e_entry` pointing at `code[0]`.
pub fn build_elf(code: &[u8]) -> Vec<u8> {
    let entry_offset = EHDR_SIZE + PHDR_SIZE; // code immediately follows ehdr+phdr
    let entry_vaddr = BASE_VADDR + entry_offset;

    let shstrtab: &[u8] = b"\0.text\0.shstrtab\0";
    let text_name_off = 1u32;
    let shstrtab_name_off = 7u32;

    let code_end = entry_offset + code.len() as u64;
    let shstrtab_off = code_end;
    let shstrtab_end = shstrtab_off + shstrtab.len() as u64;
    let shdr_off = align_up(shstrtab_end, 8);

    let mut out = Vec::new();

    // e_ident
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    out.push(2); // ELFCLASS64
    out.push(1); // ELFDATA2LSB
    out.push(EV_CURRENT as u8);
    out.push(0); // ELFOSABI_SYSV
    out.extend_from_slice(&[0u8; EI_NIDENT - 9]);
    debug_assert_eq!(out.len(), EI_NIDENT);

    out.extend_from_slice(&ET_EXEC.to_le_bytes());
    out.extend_from_slice(&EM_X86_64.to_le_bytes());
    out.extend_from_slice(&EV_CURRENT.to_le_bytes());
    out.extend_from_slice(&entry_vaddr.to_le_bytes()); // e_entry
    out.extend_from_slice(&EHDR_SIZE.to_le_bytes()); // e_phoff
    out.extend_from_slice(&shdr_off.to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
    out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes()); // e_phentsize
    out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes()); // e_shentsize
    out.extend_from_slice(&2u16.to_le_bytes()); // e_shnum (.text, .shstrtab; no null section for simplicity of this minimal writer)
    out.extend_from_slice(&1u16.to_le_bytes()); // e_shstrndx
    debug_assert_eq!(out.len() as u64, EHDR_SIZE);

    // program header: PT_LOAD covering ehdr+phdr+code, R+X
    out.extend_from_slice(&PT_LOAD.to_le_bytes());
    out.extend_from_slice(&(PF_R | PF_X).to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // p_offset
    out.extend_from_slice(&BASE_VADDR.to_le_bytes()); // p_vaddr
    out.extend_from_slice(&BASE_VADDR.to_le_bytes()); // p_paddr
    out.extend_from_slice(&code_end.to_le_bytes()); // p_filesz
    out.extend_from_slice(&code_end.to_le_bytes()); // p_memsz
    out.extend_from_slice(&PAGE_SIZE.to_le_bytes()); // p_align
    debug_assert_eq!(out.len() as u64, EHDR_SIZE + PHDR_SIZE);

    out.extend_from_slice(code);
    out.extend_from_slice(shstrtab);
    while (out.len() as u64) < shdr_off {
        out.push(0);
    }

    // section 0: .text
    out.extend_from_slice(&text_name_off.to_le_bytes());
    out.extend_from_slice(&SHT_PROGBITS.to_le_bytes());
    out.extend_from_slice(&(PF_X as u64 | 0x2 /* SHF_ALLOC */).to_le_bytes());
    out.extend_from_slice(&entry_vaddr.to_le_bytes());
    out.extend_from_slice(&entry_offset.to_le_bytes());
    out.extend_from_slice(&(code.len() as u64).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&1u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());

    // section 1: .shstrtab
    out.extend_from_slice(&shstrtab_name_off.to_le_bytes());
    out.extend_from_slice(&SHT_STRTAB.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&shstrtab_off.to_le_bytes());
    out.extend_from_slice(&(shstrtab.len() as u64).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&1u64.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());

    out
}

fn align_up(v: u64, align: u64) -> u64 {
    (v + align - 1) / align * align
}

/// Writes the ELF image to `path` with file mode `0o755`.
pub fn write_executable(path: &Path, code: &[u8]) -> io::Result<()> {
    let image = build_elf(code);
    fs::write(path, &image)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_elf_magic_and_class64() {
        let image = build_elf(&[0xc3]);
        assert_eq!(&image[0..4], &[0x7f, b'E', b'L', b'F']);
        assert_eq!(image[4], 2);
    }

    #[test]
    fn entry_point_is_right_after_headers() {
        let image = build_elf(&[0xc3, 0xc3, 0xc3]);
        let e_entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
        assert_eq!(e_entry, BASE_VADDR + EHDR_SIZE + PHDR_SIZE);
    }

    #[test]
    fn program_header_type_is_pt_load_with_r_and_x() {
        let image = build_elf(&[0xc3]);
        let p_type = u32::from_le_bytes(image[64..68].try_into().unwrap());
        let p_flags = u32::from_le_bytes(image[68..72].try_into().unwrap());
        assert_eq!(p_type, PT_LOAD);
        assert_eq!(p_flags, PF_R | PF_X);
    }

    #[test]
    fn code_bytes_appear_immediately_after_program_header() {
        let code = [0x90, 0x90, 0xc3];
        let image = build_elf(&code);
        let start = (EHDR_SIZE + PHDR_SIZE) as usize;
        assert_eq!(&image[start..start + code.len()], &code);
    }
}

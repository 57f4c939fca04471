use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::Command;

/// Compiles a C fixture from `tests/linux/fixtures` into a temporary
/// executable.
///
/// Fixtures are built non-PIE so that their ELF symbol values are their
/// runtime addresses, and unoptimized so that tracked functions survive as
/// real call targets.
pub fn compile_fixture(name: &str) -> tempfile::TempPath {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/linux/fixtures")
        .join(name);

    let out_file = tempfile::NamedTempFile::new().expect("tempfile");

    let mut gcc = Command::new("gcc");
    gcc.arg(&source)
        .arg("-o")
        .arg(out_file.path())
        .args(["-no-pie", "-O0", "-g"]);

    println!("running: {gcc:?}");

    let gcc = gcc.output().expect("gcc");

    if !gcc.status.success() {
        let msg = String::from_utf8_lossy(&gcc.stderr);
        panic!("{msg}");
    }

    out_file.into_temp_path()
}

/// Plays the external binary-parser collaborator: reads the ELF machine
/// type and the addresses of the named function symbols from a fixture.
pub fn resolve(binary: &Path, symbols: &[&str]) -> (u16, Vec<u64>) {
    let bytes = std::fs::read(binary).expect("read fixture");
    let elf = goblin::elf::Elf::parse(&bytes).expect("parse fixture");

    let addrs = symbols
        .iter()
        .map(|wanted| {
            elf.syms
                .iter()
                .find(|sym| elf.strtab.get_at(sym.st_name) == Some(wanted))
                .map(|sym| sym.st_value)
                .unwrap_or_else(|| panic!("symbol {wanted} not found in fixture"))
        })
        .collect();

    (elf.header.e_machine, addrs)
}

/// ELF machine type of binaries the test host natively runs.
pub fn host_machine() -> u16 {
    #[cfg(target_arch = "x86_64")]
    {
        covtrace_engine::arch::EM_X86_64
    }
    #[cfg(target_arch = "aarch64")]
    {
        covtrace_engine::arch::EM_AARCH64
    }
}

/// Reads the aligned machine word covering `addr` from a process's memory,
/// through procfs rather than ptrace. Works on untraced children.
pub fn read_proc_word(pid: u32, addr: u64) -> u64 {
    let aligned = addr & !7;

    let mut mem = std::fs::File::open(format!("/proc/{pid}/mem")).expect("open mem");
    mem.seek(SeekFrom::Start(aligned)).expect("seek mem");

    let mut word = [0u8; 8];
    mem.read_exact(&mut word).expect("read mem");

    u64::from_le_bytes(word)
}

//! Release archives built in memory.

use std::io::{Cursor, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// `.tar.gz` with a top-level directory holding `yo` and a README.
pub fn yo_tar_gz(script: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    append(&mut builder, "yo-1.3.5/README.md", b"yo\n", 0o644);
    append(&mut builder, "yo-1.3.5/yo", script, 0o755);
    builder.into_inner().unwrap().finish().unwrap()
}

fn append<W: Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8], mode: u32) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append_data(&mut header, name, data).unwrap();
}

/// `.zip` holding `yo.exe` at the root.
pub fn yo_zip(exe: &[u8]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    w.start_file("yo.exe", opts).unwrap();
    w.write_all(exe).unwrap();
    w.finish().unwrap().into_inner()
}

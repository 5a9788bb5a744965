//! Dump the structure of a drawing file to stdout.
//!
//! Reads a DWG or DXF file (sniffed from the leading bytes), then prints
//! the version, header variables, class registrations, an object census,
//! and any notifications the reader raised.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use dwgcodec::dxf::BINARY_SENTINEL;
use dwgcodec::{dwg, dxf, Document};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: dwgdump <file.dwg|file.dxf>");
    };
    let data = std::fs::read(&path).with_context(|| format!("reading {path}"))?;

    let doc = if data.len() >= 6 && data[..2] == *b"AC" && data[2..6].iter().all(u8::is_ascii_digit)
    {
        dwg::read_dwg(&data).with_context(|| format!("parsing {path} as DWG"))?
    } else if data.starts_with(BINARY_SENTINEL) || looks_like_text_dxf(&data) {
        dxf::read_dxf(&data).with_context(|| format!("parsing {path} as DXF"))?
    } else {
        bail!("{path}: not a recognizable DWG or DXF file");
    };

    dump(&doc);
    Ok(())
}

fn looks_like_text_dxf(data: &[u8]) -> bool {
    // a text DXF opens with a group code line, usually "  0"
    data.iter()
        .take(8)
        .all(|b| b.is_ascii_whitespace() || b.is_ascii_digit())
}

fn dump(doc: &Document) {
    println!("version:      {}", doc.version);
    println!("objects:      {}", doc.len());
    println!("handle seed:  {:#X}", doc.handle_seed().value());
    if !doc.summary.title.is_empty() {
        println!("title:        {}", doc.summary.title);
    }
    if let Some(thumb) = &doc.thumbnail {
        println!("thumbnail:    {} bytes", thumb.len());
    }

    let mut census: BTreeMap<&str, usize> = BTreeMap::new();
    for obj in doc.objects() {
        if !obj.is_freed() {
            *census.entry(obj.dxf_name.as_str()).or_default() += 1;
        }
    }
    println!("\nobject census:");
    for (name, count) in census {
        println!("  {count:>6}  {name}");
    }

    if !doc.classes.is_empty() {
        println!("\nclasses:");
        for class in doc.classes.iter() {
            println!("  {:>5}  {}", class.class_number, class.dxf_name);
        }
    }

    if !doc.error_flags.is_empty() {
        println!("\nerror flags: {:?}", doc.error_flags);
    }
    if !doc.notifications.is_empty() {
        println!("\nnotifications:");
        for n in doc.notifications.iter() {
            println!("  {n}");
        }
    }
}

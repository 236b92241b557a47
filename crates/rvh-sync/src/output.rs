use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use rvh_core::ReviewSet;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const TSV_HEADER: [&str; 4] = ["Date", "User", "Rating", "Text"];

/// Pretty output with every non-ASCII character written as a `\uXXXX` escape
/// (surrogate pairs above the BMP), so snapshots are pure ASCII.
struct AsciiPrettyFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl<'a> AsciiPrettyFormatter<'a> {
    fn with_indent(indent: &'a [u8]) -> Self {
        Self {
            pretty: PrettyFormatter::with_indent(indent),
        }
    }
}

impl Formatter for AsciiPrettyFormatter<'_> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut ascii_from = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[ascii_from..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            ascii_from = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[ascii_from..])
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pretty.end_object_value(writer)
    }
}

pub fn snapshot_json(reviews: &ReviewSet) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = AsciiPrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    reviews
        .serialize(&mut ser)
        .context("serializing review snapshot")?;
    Ok(buf)
}

/// Write the snapshot through a temp file + rename so a failed run leaves the old file alone.
pub async fn write_snapshot(path: &Path, reviews: &ReviewSet) -> Result<()> {
    let bytes = snapshot_json(reviews)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&parent)
        .await
        .with_context(|| format!("creating {}", parent.display()))?;

    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    let mut file = fs::File::create(&temp_path)
        .await
        .with_context(|| format!("opening temp snapshot {}", temp_path.display()))?;
    file.write_all(&bytes)
        .await
        .with_context(|| format!("writing temp snapshot {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp snapshot {}", temp_path.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| {
            format!(
                "renaming snapshot {} -> {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

pub async fn read_snapshot(path: &Path) -> Result<ReviewSet> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn render_tsv(reviews: &ReviewSet) -> String {
    let mut lines = vec![TSV_HEADER.join("\t")];
    for record in reviews.records() {
        lines.push(
            [
                record.date.as_str(),
                record.author.as_str(),
                record.rating_text().as_str(),
                record.text.as_str(),
            ]
            .join("\t"),
        );
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

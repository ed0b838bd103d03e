use crate::{DocMeta, Document, SimilarityRecord};
use std::fs::{create_dir_all, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::Date;

/// Tab-separated report files written at the end of a run.
pub struct ReportPaths {
    pub root: PathBuf,
}

impl ReportPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn documents(&self) -> PathBuf { self.root.join("documents.tsv") }
    pub fn authors(&self) -> PathBuf { self.root.join("authors.tsv") }
    pub fn similarities(&self) -> PathBuf { self.root.join("similarities.tsv") }
}

/// One row of the authors report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRow {
    pub id: u32,
    pub name: String,
    pub birth_year: Option<i32>,
}

pub fn iso_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]")).unwrap_or_default()
}

fn field(value: Option<&str>) -> String {
    // Tabs and newlines inside a field would break the row.
    value.unwrap_or("").replace(['\t', '\n', '\r'], " ")
}

/// Distinct (name, birth year) authors in order of first appearance, numbered from 1.
pub fn authors<'a, I>(metas: I) -> Vec<AuthorRow>
where
    I: IntoIterator<Item = &'a DocMeta>,
{
    let mut rows: Vec<AuthorRow> = Vec::new();
    for meta in metas {
        let Some(name) = meta.author.as_deref() else { continue };
        if rows.iter().any(|r| r.name == name && r.birth_year == meta.author_birth_year) {
            continue;
        }
        let id = rows.len() as u32 + 1;
        rows.push(AuthorRow { id, name: name.to_string(), birth_year: meta.author_birth_year });
    }
    rows
}

pub fn write_documents<W: Write>(out: &mut W, docs: &[Document]) -> io::Result<()> {
    for d in docs {
        let meta = d.meta();
        let date = meta.published.map(iso_date);
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            d.id(),
            field(meta.title.as_deref()),
            field(meta.author.as_deref()),
            date.unwrap_or_default()
        )?;
    }
    Ok(())
}

pub fn write_authors<W: Write>(out: &mut W, rows: &[AuthorRow]) -> io::Result<()> {
    for r in rows {
        let year = r.birth_year.map(|y| y.to_string()).unwrap_or_default();
        writeln!(out, "{}\t{}\t{}", r.id, field(Some(r.name.as_str())), year)?;
    }
    Ok(())
}

pub fn write_similarities<W: Write>(out: &mut W, records: &[SimilarityRecord]) -> io::Result<()> {
    for r in records {
        writeln!(out, "{}\t{}\t{:.6}", r.source, r.target, r.score)?;
    }
    Ok(())
}

/// Write all three reports under `paths.root`.
pub fn save_reports(paths: &ReportPaths, docs: &[Document], records: &[SimilarityRecord]) -> io::Result<()> {
    create_dir_all(&paths.root)?;

    let mut f = BufWriter::new(File::create(paths.documents())?);
    write_documents(&mut f, docs)?;
    f.flush()?;

    let rows = authors(docs.iter().map(Document::meta));
    let mut f = BufWriter::new(File::create(paths.authors())?);
    write_authors(&mut f, &rows)?;
    f.flush()?;

    let mut f = BufWriter::new(File::create(paths.similarities())?);
    write_similarities(&mut f, records)?;
    f.flush()?;
    Ok(())
}

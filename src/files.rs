//! File commands: the "My Files" dashboard, document details, upload,
//! delete, and download.

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::api::ApiClient;
use crate::display::{wrap, DisplayStore};
use crate::models::{FileInfo, FileMetadata};
use crate::output::{format_bytes, format_relative, parse_backend_ts, print_json, OutputMode};

pub async fn run_list(api: &ApiClient, mode: OutputMode) -> Result<()> {
    let files = api.list_files().await?;
    if mode == OutputMode::Json {
        return print_json(&files);
    }
    print!("{}", render_file_table(&files));
    Ok(())
}

pub fn render_file_table(files: &[FileInfo]) -> String {
    if files.is_empty() {
        return "No files yet. Upload one with `odin files upload <path>`.\n".to_string();
    }

    let mut out = String::from("My Files\n\n");
    out.push_str(&format!(
        "{:<34} {:<36} {:>10}   {}\n",
        "FILE ID", "FILENAME", "SIZE", "LAST MODIFIED"
    ));
    out.push_str(&format!("{}\n", "-".repeat(100)));
    for f in files {
        out.push_str(&format!(
            "{:<34} {:<36} {:>10}   {}\n",
            f.file_id,
            f.filename,
            format_bytes(f.size),
            f.last_modified
        ));
    }
    out.push_str(&format!("\n{} file(s)\n", files.len()));
    out
}

pub async fn run_show(
    api: &ApiClient,
    display: &DisplayStore,
    file_id: &str,
    raw: bool,
    mode: OutputMode,
) -> Result<()> {
    if file_id.trim().is_empty() {
        anyhow::bail!("file id must not be empty");
    }

    let meta = api.file_metadata(file_id).await?;
    if mode == OutputMode::Json {
        return print_json(&meta);
    }
    if raw {
        println!("{}", meta.content);
        return Ok(());
    }

    let snapshot = display.snapshot();
    if !snapshot.hydrated {
        anyhow::bail!("display preferences are not loaded yet");
    }
    print!(
        "{}",
        render_details(&meta, snapshot.state.font_size.wrap_width(), snapshot.state.indent())
    );
    Ok(())
}

pub fn render_details(meta: &FileMetadata, width: usize, indent: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}  ({})\n", meta.filename, meta.content_type));

    if let Some(created) = meta.created_at.as_deref().and_then(parse_backend_ts) {
        out.push_str(&format!("Uploaded {}\n", format_relative(created, Utc::now())));
    }

    if !meta.categories.is_empty() {
        let badges: Vec<String> = meta.categories.iter().map(|c| format!("[{}]", c)).collect();
        out.push_str(&badges.join(" "));
        out.push('\n');
    }

    out.push_str(&format!("{}\n\n", "─".repeat(width.min(80))));
    out.push_str(&wrap(&meta.content, width, indent));
    out
}

pub async fn run_upload(api: &ApiClient, paths: &[PathBuf], mode: OutputMode) -> Result<()> {
    for path in paths {
        if !path.is_file() {
            anyhow::bail!("not a file: {}", path.display());
        }
    }

    tracing::info!(count = paths.len(), "uploading files");
    let response = api.upload_files(paths).await?;
    if mode == OutputMode::Json {
        return print_json(&response);
    }

    println!("{}", response.message);
    for r in &response.results {
        match (&r.file_id, r.success) {
            (Some(id), true) => {
                let note = if r.docling_processed {
                    ""
                } else {
                    "  (content extraction pending)"
                };
                println!("  ok      {}  →  {}{}", r.filename, id, note);
            }
            _ => println!(
                "  failed  {}: {}",
                r.filename,
                r.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!(
        "uploaded: {} / {}",
        response.summary.successful_uploads, response.summary.total_files
    );

    if response.summary.failed_uploads > 0 {
        anyhow::bail!("{} upload(s) failed", response.summary.failed_uploads);
    }
    Ok(())
}

pub async fn run_delete(api: &ApiClient, file_id: &str, mode: OutputMode) -> Result<()> {
    let response = api.delete_file(file_id).await?;
    if mode == OutputMode::Json {
        return print_json(&response);
    }
    println!("{}", response.message);
    Ok(())
}

pub async fn run_download(api: &ApiClient, file_id: &str, output: Option<&Path>) -> Result<()> {
    let download = api.download_file(file_id).await?;
    let target = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(sanitize_filename(
            download.filename.as_deref().unwrap_or(file_id),
        )),
    };
    tokio::fs::write(&target, &download.bytes).await?;
    println!(
        "Saved {} ({}) to {}",
        download.filename.as_deref().unwrap_or(file_id),
        format_bytes(download.bytes.len() as u64),
        target.display()
    );
    Ok(())
}

pub async fn run_categories(api: &ApiClient, mode: OutputMode) -> Result<()> {
    let categories = api.categories().await?;
    if mode == OutputMode::Json {
        return print_json(&categories);
    }
    if categories.is_empty() {
        println!("No categories.");
    }
    for c in &categories {
        println!("{}", c);
    }
    Ok(())
}

/// Strips directory components from a server-supplied filename.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        "download".to_string()
    } else {
        base.to_string()
    }
}

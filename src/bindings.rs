//! TypeScript bindings for the host view.

use crate::downloads::DownloadTaskState;
use crate::events::SessionEvent;
use crate::gateway::{ChapterEntry, ChapterPages};
use crate::pagination::PaginationView;
use crate::resilience::RetryPolicy;
use crate::route::ChapterRoute;
use crate::session::{ChapterSession, SessionSnapshot, SessionStatus};
use std::fs;
use std::path::{Path, PathBuf};
use ts_rs::TS;

/// Export `T` (and whatever it references) and report the name it was
/// written under.
fn export_type<T: TS + 'static>(out_dir: &Path) -> Result<String, String> {
    T::export_all_to(out_dir).map_err(|err| format!("Failed to export {}: {err}", T::name()))?;
    Ok(T::name())
}

/// `.ts` files left by a previous export. A type renamed or removed since
/// then would otherwise linger in the index's directory.
fn generated_files(out_dir: &Path) -> Result<Vec<PathBuf>, String> {
    let listing = fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?;
    Ok(listing
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "ts"))
        .collect())
}

fn index_content(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("export type {{ {name} }} from \"./{name}\";\n"))
        .collect()
}

/// Write every host-facing type to `out_dir`, replacing earlier output,
/// plus an `index.ts` re-exporting them.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;
    for stale in generated_files(out_dir)? {
        fs::remove_file(&stale)
            .map_err(|err| format!("Failed to remove {}: {err}", stale.display()))?;
    }

    let names = vec![
        export_type::<ChapterRoute>(out_dir)?,
        export_type::<ChapterPages>(out_dir)?,
        export_type::<ChapterEntry>(out_dir)?,
        export_type::<RetryPolicy>(out_dir)?,
        export_type::<DownloadTaskState>(out_dir)?,
        export_type::<SessionEvent>(out_dir)?,
        export_type::<SessionStatus>(out_dir)?,
        export_type::<ChapterSession>(out_dir)?,
        export_type::<SessionSnapshot>(out_dir)?,
        export_type::<PaginationView>(out_dir)?,
    ];

    let index_path = out_dir.join("index.ts");
    fs::write(&index_path, index_content(&names))
        .map_err(|err| format!("Failed to write {}: {err}", index_path.display()))
}

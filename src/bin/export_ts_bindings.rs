use std::path::Path;

fn main() {
    let out_dir = Path::new("bindings/generated");
    if let Err(err) = chapter_reader::bindings::export_ts_bindings(out_dir) {
        eprintln!("failed to export TS bindings: {err}");
        std::process::exit(1);
    }
    println!("exported TS bindings to {}", out_dir.display());
}

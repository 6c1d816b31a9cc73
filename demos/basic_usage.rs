// Basic usage example for verset
//
// Run with: cargo run --example basic_usage
//
// Simulates two releases of an upload client: the first run of 1.1 inherits
// whatever 1.0 saved.

use serde::{Deserialize, Serialize};
use verset::{ParseCodec, VersionedSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Server {
    url: String,
    name: String,
    connection_count: u32,
}

fn main() -> verset::Result<()> {
    env_logger::init();

    let root = std::env::temp_dir().join("verset-demo");
    let _ = std::fs::remove_dir_all(&root);

    // First release: defaults are installed on first run
    {
        let settings = VersionedSettings::builder("Acme", "Uploader", "1.0.0.0")
            .config_root(&root)
            .build(|store| {
                store.get_or_set_default(
                    "servers.list",
                    vec![Server {
                        url: "upload.example.com".into(),
                        name: "Example".into(),
                        connection_count: 0,
                    }],
                )?;
                store.get_or_set_default_with(&ParseCodec, "upload.port", 8080u16)?;
                Ok(())
            })?;

        settings.subscribe("upload.port", || println!("  -> upload.port changed"));
        settings.set_with(&ParseCodec, "upload.port", &9090u16)?;
        settings.save()?;

        println!("1.0.0.0 wrote {}", settings.settings_path().display());
    }

    // Second release: the 1.0 file is copied forward, new defaults are added
    let settings = VersionedSettings::builder("Acme", "Uploader", "1.1.0.0")
        .config_root(&root)
        .build(|store| {
            store.get_or_set_default("ui.theme", "dark".to_string())?;
            Ok(())
        })?;

    println!(
        "1.1.0.0 migrated from {:?}",
        settings.migrated_from().map(|v| v.to_string())
    );
    let port: u16 = settings.get_with(&ParseCodec, "upload.port");
    let servers: Vec<Server> = settings.get("servers.list");
    println!("upload.port = {port}");
    println!("servers.list = {servers:?}");
    println!("ui.theme = {}", settings.get::<String>("ui.theme"));

    for key in settings.keys() {
        println!("  {key} = {}", settings.raw(&key).unwrap_or_default());
    }

    Ok(())
}

//! Applies the migrations to a scratch SQLite file under `OUT_DIR` and
//! points the `sqlx::query!` macros at it through `DATABASE_URL`.

use std::{env, error::Error, path::PathBuf};

use sqlx::{
    ConnectOptions,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=migrations");
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let db_path = PathBuf::from(env::var("OUT_DIR")?).join("schema.sqlite");
    if db_path.exists() {
        std::fs::remove_file(&db_path)?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut conn = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .connect()
            .await?;
        Migrator::new(manifest_dir.join("migrations"))
            .await?
            .run(&mut conn)
            .await?;
        Ok::<_, Box<dyn Error>>(())
    })?;

    println!("cargo:rustc-env=DATABASE_URL=sqlite://{}", db_path.display());
    Ok(())
}

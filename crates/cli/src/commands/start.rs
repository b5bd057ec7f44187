use std::fs;

use crate::commands::{prepare, CommandResult};
use tripflow_db::{connect_with_config, migrations, ping};

/// Preflight for `tripflow-server`: config, database, schema and upload
/// directory must all be usable before the server is launched.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        ping(&pool).await.map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });
    if let Err((error_class, message, exit_code)) = result {
        return CommandResult::failure("start", error_class, message, exit_code);
    }

    if let Err(error) = fs::create_dir_all(&config.uploads.directory) {
        return CommandResult::failure(
            "start",
            "uploads",
            format!("upload directory `{}` is not usable: {error}", config.uploads.directory.display()),
            7,
        );
    }

    CommandResult::success(
        "start",
        format!(
            "preflight passed; tripflow-server will listen on {}:{}",
            config.server.bind_address, config.server.port
        ),
    )
}

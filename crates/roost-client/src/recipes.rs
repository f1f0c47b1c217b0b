//! Convenience loops over the core API.

use std::future::Future;
use std::pin::Pin;

use roost_proto::{Acl, CreateFlags, ServerErrorKind};

use crate::connection::Connection;
use crate::error::Error;

/// Creates every missing node along `path` with open ACLs and no data.
/// Prefixes that already exist are left untouched.
pub async fn ensure_path(
    conn: &Connection,
    path: &str,
) -> Result<(), Error> {
    let mut prefix = String::with_capacity(path.len());
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);
        match conn
            .create(&prefix, b"", CreateFlags::empty(), vec![Acl::open_unsafe()])
            .await
        {
            Ok(_) => {}
            Err(Error::Server(ServerErrorKind::NodeExists)) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Deletes `path` and everything below it, depth first.
pub async fn delete_all(
    conn: &Connection,
    path: &str,
) -> Result<(), Error> {
    delete_subtree(conn, path.to_string()).await
}

fn delete_subtree(
    conn: &Connection,
    path: String,
) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + '_>> {
    Box::pin(async move {
        for child in conn.ls(&path).await? {
            let child_path = if path == "/" {
                format!("/{child}")
            } else {
                format!("{path}/{child}")
            };
            delete_subtree(conn, child_path).await?;
        }
        conn.delete(&path).await
    })
}

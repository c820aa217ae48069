//! Scoped editing of an object's source: lock, write, unlock.
//!
//! # Design
//! `edit` is the only way to obtain an `Editor`. It acquires the lock,
//! hands the editor to a closure and releases the lock afterwards on every
//! path, exactly once per successful acquire. An error from the closure wins
//! over an error from the unlock, which is still logged; when the closure
//! succeeds, an unlock failure is returned to the caller. A panic in the
//! closure is caught, the lock released, and the panic resumed.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

use crate::connection::{Connection, Request};
use crate::error::{ApiError, Result};
use crate::http::HttpMethod;
use crate::xml::Element;

const LOCK_RESULT: &str = "dataname=com.sap.adt.lock.Result";
const LOCK_ACCEPT: &str =
    "application/*,application/vnd.sap.as+xml;charset=UTF-8;dataname=com.sap.adt.lock.Result";
const SESSION_TYPE: &str = "X-sap-adt-sessiontype";

/// Opaque token proving ownership of an object lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle(String);

impl LockHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lock the object at `uri` for modification.
pub fn lock(connection: &mut Connection, uri: &str) -> Result<LockHandle> {
    let request = Request::new()
        .param("_action", "LOCK")
        .param("accessMode", "MODIFY")
        .header(SESSION_TYPE, "stateful")
        .header("Accept", LOCK_ACCEPT);
    let response = connection.execute(HttpMethod::Post, uri, &request)?;

    let content_type = response.content_type().unwrap_or_default();
    if !content_type.contains(LOCK_RESULT) {
        return Err(ApiError::UnexpectedResponseContent {
            content_type: content_type.to_string(),
            body: response.body,
        });
    }

    let root = Element::parse(&response.body)?;
    let handle = root
        .find_descendant_text("LOCK_HANDLE")
        .ok_or_else(|| ApiError::MissingLockHandle(response.body.clone()))?;
    debug!(uri, "locked");
    Ok(LockHandle(handle.to_string()))
}

/// Release the lock identified by `handle`.
pub fn unlock(connection: &mut Connection, uri: &str, handle: &LockHandle) -> Result<()> {
    let request = Request::new()
        .param("_action", "UNLOCK")
        .param("lockHandle", handle.as_str())
        .header(SESSION_TYPE, "stateful");
    connection.execute(HttpMethod::Post, uri, &request)?;
    debug!(uri, "unlocked");
    Ok(())
}

/// Writes source text of a locked object.
#[derive(Debug)]
pub struct Editor<'c> {
    connection: &'c mut Connection,
    uri: String,
    handle: LockHandle,
    corrnr: Option<String>,
}

impl Editor<'_> {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn lock_handle(&self) -> &LockHandle {
        &self.handle
    }

    /// Replace the main source with `text`.
    pub fn write(&mut self, text: &str) -> Result<()> {
        let mut request = Request::new()
            .param("lockHandle", self.handle.as_str())
            .content_type("text/plain; charset=utf-8")
            .body(text);
        if let Some(corrnr) = &self.corrnr {
            request = request.param("corrNr", corrnr.as_str());
        }

        let path = format!("{}/source/main", self.uri);
        self.connection.execute(HttpMethod::Put, &path, &request)?;
        debug!(uri = %self.uri, bytes = text.len(), "source written");
        Ok(())
    }
}

/// Lock `uri`, run `f`, unlock.
pub fn edit<R>(
    connection: &mut Connection,
    uri: &str,
    corrnr: Option<&str>,
    f: impl FnOnce(&mut Editor<'_>) -> Result<R>,
) -> Result<R> {
    let handle = lock(connection, uri)?;

    let mut editor = Editor {
        connection,
        uri: uri.to_string(),
        handle,
        corrnr: corrnr.map(str::to_string),
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut editor)));
    let Editor {
        connection, handle, ..
    } = editor;
    let released = unlock(connection, uri, &handle);

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(payload) => {
            if let Err(unlock_err) = released {
                error!(uri, error = %unlock_err, "unlock failed after editor panic");
            }
            panic::resume_unwind(payload);
        }
    };
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(unlock_err)) => {
            error!(uri, error = %unlock_err, "unlock failed after edit error");
            Err(err)
        }
    }
}

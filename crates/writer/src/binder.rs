//! Output binder
//!
//! Owns the live container writer and the rolling policy. Lives on the
//! writer thread; nothing here is shared.
//!
//! ```text
//! Unbound --bind--> Bound --roll--> Bound ... --close--> Closed
//!                     \--roll, re-open fails--> Failed --next batch--> Bound
//! ```
//!
//! A failed roll or re-open is retried at most once per batch: the gate is
//! set by the failure and lifted by the end-of-batch flush. Under a lasting
//! failure the file still gets one block per batch, not one per record.

use std::path::{Path, PathBuf};

use serde::Serialize;
use spool_container::{ContainerWriter, Schema, WriterOptions, read_schema};
use spool_rolling::RollingPolicy;

use crate::error::{Result, WriterError};

enum BinderState {
    Unbound,
    Bound(ContainerWriter),
    /// A roll left no usable file behind
    Failed,
    Closed,
}

/// Binds the live path to a container writer and rolls it over
pub struct OutputBinder<R> {
    path: PathBuf,
    schema: Schema,
    options: WriterOptions,
    policy: Box<dyn RollingPolicy<R>>,
    state: BinderState,
    /// Set by a failed roll or re-open; cleared by `flush`
    retry_held: bool,
}

impl<R: Serialize> OutputBinder<R> {
    pub fn new(
        path: impl Into<PathBuf>,
        schema: Schema,
        options: WriterOptions,
        policy: Box<dyn RollingPolicy<R>>,
    ) -> Self {
        Self {
            path: path.into(),
            schema,
            options,
            policy,
            state: BinderState::Unbound,
            retry_held: false,
        }
    }

    /// Open the live file: create it, append to it, or roll it away first
    ///
    /// An existing file is appended to only if its embedded schema equals
    /// the configured one; otherwise it is archived through the policy and
    /// a fresh file is created.
    pub fn bind(&mut self) -> Result<()> {
        self.policy.register_path(&self.path);

        let writer = if self.path.exists() {
            let found = read_schema(&self.path).map_err(|source| WriterError::Init {
                path: self.path.clone(),
                source,
            })?;

            if found == self.schema {
                tracing::info!(path = %self.path.display(), "appending to existing output file");
                self.open_append()?
            } else {
                let archive = self
                    .policy
                    .rollover()
                    .map_err(|source| WriterError::rollover(&self.path, source))?;
                tracing::info!(
                    path = %self.path.display(),
                    archive = %archive.display(),
                    found = %found.full_name(),
                    expected = %self.schema.full_name(),
                    "schema changed, rolled existing output file"
                );
                self.create()?
            }
        } else {
            tracing::info!(path = %self.path.display(), "creating output file");
            self.create()?
        };

        self.state = BinderState::Bound(writer);
        Ok(())
    }

    /// Append a record and roll the file if the policy says so
    ///
    /// Returns the archive path when this write triggered a roll. While a
    /// failed roll is held back the record stays in the current file.
    pub fn write(&mut self, record: &R) -> Result<Option<PathBuf>> {
        let writer = self.writer()?;
        if let Err(e) = writer.append(record) {
            if writer.is_poisoned() {
                self.roll_away_torn_file();
            }
            return Err(WriterError::Append(e));
        }

        let due = self
            .policy
            .should_rollover(record)
            .map_err(WriterError::Policy)?;
        if due && !self.retry_held {
            return self.roll().map(Some);
        }
        Ok(None)
    }

    /// Write the pending block out to the file and lift the retry gate
    pub fn flush(&mut self) -> Result<()> {
        self.retry_held = false;
        let writer = match &mut self.state {
            BinderState::Bound(writer) => writer,
            BinderState::Closed => return Err(WriterError::Closed),
            BinderState::Unbound | BinderState::Failed => return Err(WriterError::NotBound),
        };
        if let Err(e) = writer.flush() {
            if writer.is_poisoned() {
                self.roll_away_torn_file();
            }
            return Err(WriterError::Flush(e));
        }
        Ok(())
    }

    /// Roll the live file and bind a fresh one in its place
    ///
    /// If the policy cannot rename the file, the original file is opened
    /// again in append mode and the error is returned; records keep going
    /// to the old file.
    pub fn roll(&mut self) -> Result<PathBuf> {
        let writer = match std::mem::replace(&mut self.state, BinderState::Failed) {
            BinderState::Bound(writer) => writer,
            other => {
                let error = match other {
                    BinderState::Closed => WriterError::Closed,
                    _ => WriterError::NotBound,
                };
                self.state = other;
                return Err(error);
            }
        };

        if let Err(e) = writer.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to close output file before rollover");
        }

        match self.policy.rollover() {
            Ok(archive) => {
                let writer = self.create().inspect_err(|_| self.retry_held = true)?;
                self.state = BinderState::Bound(writer);
                Ok(archive)
            }
            Err(source) => {
                self.retry_held = true;
                let error = WriterError::rollover(&self.path, source);
                match self.open_append() {
                    Ok(writer) => {
                        tracing::warn!(path = %self.path.display(), error = %error, "rollover failed, continuing in current file");
                        self.state = BinderState::Bound(writer);
                    }
                    Err(reopen) => {
                        tracing::error!(
                            path = %self.path.display(),
                            error = %error,
                            reopen_error = %reopen,
                            "rollover failed and output file could not be reopened"
                        );
                    }
                }
                Err(error)
            }
        }
    }

    /// Flush and close the live file; later writes fail with `Closed`
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, BinderState::Closed) {
            BinderState::Bound(writer) => writer.close().map_err(WriterError::Flush),
            _ => Ok(()),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, BinderState::Bound(_))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index the next archive will carry
    pub fn rolling_index(&self) -> u32 {
        self.policy.rolling_index()
    }

    fn writer(&mut self) -> Result<&mut ContainerWriter> {
        if matches!(self.state, BinderState::Failed) && !self.retry_held {
            self.rebind();
        }
        match &mut self.state {
            BinderState::Bound(writer) => Ok(writer),
            BinderState::Closed => Err(WriterError::Closed),
            BinderState::Unbound | BinderState::Failed => Err(WriterError::NotBound),
        }
    }

    /// Bind again after a failed roll: append if the live file survived,
    /// otherwise start a fresh one
    fn rebind(&mut self) {
        let reopened = if self.path.exists() {
            self.open_append()
        } else {
            self.create()
        };
        match reopened {
            Ok(writer) => {
                tracing::info!(path = %self.path.display(), "output file bound again after failure");
                self.state = BinderState::Bound(writer);
            }
            Err(e) => {
                self.retry_held = true;
                tracing::debug!(path = %self.path.display(), error = %e, "output file still unavailable");
            }
        }
    }

    /// Archive a file that ends in a torn block so new blocks start clean
    fn roll_away_torn_file(&mut self) {
        if self.retry_held {
            return;
        }
        match self.roll() {
            Ok(archive) => tracing::warn!(
                path = %self.path.display(),
                archive = %archive.display(),
                "rolled output file with a torn block"
            ),
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                "failed to roll output file with a torn block"
            ),
        }
    }

    fn create(&self) -> Result<ContainerWriter> {
        ContainerWriter::create(&self.path, &self.schema, self.options).map_err(|source| {
            WriterError::Init {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn open_append(&self) -> Result<ContainerWriter> {
        ContainerWriter::append_to(&self.path, &self.schema, self.options).map_err(|source| {
            WriterError::Init {
                path: self.path.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
#[path = "binder_test.rs"]
mod binder_test;

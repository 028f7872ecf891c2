//! The predicate evaluator shared by every checking mode.

#![allow(clippy::future_not_send, reason = "checks are awaited inline by the test that owns the reporter")]

use bson::Document;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::{filter::to_filter, report::Channel, DocumentCollection, Failure, Reporter};

/// How a façade reacts to a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Repair missing documents and empty collections; anything that cannot
    /// be repaired stops the test.
    Condition,
    /// Detect only; the first failure stops the test.
    Require,
    /// Detect only; every failure is recorded and the test keeps running.
    Assert,
}

impl Mode {
    /// Returns true if a missing document is written instead of reported.
    pub const fn repairs(self) -> bool { matches!(self, Self::Condition) }

    /// The channel mismatches are reported through.
    pub const fn channel(self) -> Channel {
        match self {
            Self::Condition | Self::Require => Channel::Fatal,
            Self::Assert => Channel::NonFatal,
        }
    }
}

/// Evaluates predicates against one collection and reports through one sink.
///
/// Every predicate issues its remote calls strictly in argument order. A fatal
/// report never returns, so nothing after it runs.
#[derive(Debug)]
pub struct Checker<'a, C: ?Sized, R: ?Sized> {
    /// The collection under test.
    collection: &'a C,
    /// Where failures go.
    reporter:   &'a R,
    /// How mismatches are handled.
    mode:       Mode,
}

impl<'a, C, R> Checker<'a, C, R>
where
    C: DocumentCollection + ?Sized,
    R: Reporter + ?Sized,
{
    pub const fn new(collection: &'a C, reporter: &'a R, mode: Mode) -> Self {
        Self {
            collection,
            reporter,
            mode,
        }
    }

    pub const fn mode(&self) -> Mode { self.mode }

    /// Every filter must match a document.
    pub async fn exists<I, T>(&self, filters: I)
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        for (position, value) in filters.into_iter().enumerate() {
            let filter = self.encode(position, &value);
            match self.collection.find_one_matching(&filter).await {
                Ok(Some(_)) => trace!("Document {} exists in {}", filter, self.name()),
                Ok(None) if self.mode.repairs() => self.repair(filter).await,
                Ok(None) => {
                    self.report(Failure::Missing {
                        filter,
                        collection: self.name().to_owned(),
                    });
                },
                Err(source) => {
                    self.report(Failure::LookupFailed {
                        filter,
                        collection: self.name().to_owned(),
                        source,
                    });
                },
            }
        }
    }

    /// No filter may match a document. Never deletes, whatever the mode.
    pub async fn not_exists<I, T>(&self, filters: I)
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        for (position, value) in filters.into_iter().enumerate() {
            let filter = self.encode(position, &value);
            match self.collection.find_one_matching(&filter).await {
                Ok(None) => trace!("Document {} absent from {}", filter, self.name()),
                Ok(Some(_)) => {
                    self.report(Failure::Found {
                        filter,
                        collection: self.name().to_owned(),
                    });
                },
                Err(source) => {
                    self.report(Failure::LookupFailed {
                        filter,
                        collection: self.name().to_owned(),
                        source,
                    });
                },
            }
        }
    }

    /// The collection must hold no document.
    pub async fn empty(&self) {
        if self.mode.repairs() {
            if let Err(source) = self.collection.drop_collection().await {
                self.halt(Failure::DropFailed {
                    collection: self.name().to_owned(),
                    source,
                });
            }
            debug!("Dropped collection {}", self.name());
            return;
        }

        match self.collection.count_all().await {
            Ok(0) => trace!("Collection {} is empty", self.name()),
            Ok(count) => {
                self.report(Failure::NotEmpty {
                    count,
                    collection: self.name().to_owned(),
                });
            },
            // Fatal in every mode
            Err(source) => {
                self.halt(Failure::CountFailed {
                    collection: self.name().to_owned(),
                    source,
                });
            },
        }
    }

    /// Writes a missing document.
    async fn repair(&self, filter: Document) {
        match self.collection.upsert_matching(&filter).await {
            Ok(()) => debug!("Ensured document {} in {}", filter, self.name()),
            Err(source) => {
                self.halt(Failure::WriteFailed {
                    filter,
                    collection: self.name().to_owned(),
                    source,
                });
            },
        }
    }

    /// Encodes a filter argument, stopping the test in every mode on failure.
    fn encode<T>(&self, position: usize, value: &T) -> Document
    where
        T: Serialize,
    {
        match to_filter(value) {
            Ok(filter) => filter,
            Err(source) => {
                self.halt(Failure::EncodeFailed {
                    position,
                    collection: self.name().to_owned(),
                    source,
                })
            },
        }
    }

    /// Reports through the mode's channel.
    fn report(&self, failure: Failure) {
        match self.mode.channel() {
            Channel::Fatal => self.halt(failure),
            Channel::NonFatal => {
                warn!("{:?} check failed: {}", self.mode, failure);
                self.reporter.non_fatal(failure);
            },
        }
    }

    /// Reports through the fatal channel.
    fn halt(&self, failure: Failure) -> ! {
        error!("{:?} check failed: {}", self.mode, failure);
        self.reporter.fatal(failure)
    }

    fn name(&self) -> &str { self.collection.collection_name() }
}

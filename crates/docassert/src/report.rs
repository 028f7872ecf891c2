//! Failure reports and the sinks that receive them.

use std::{
    panic,
    sync::{Mutex, PoisonError},
    thread,
};

use bson::Document;
use thiserror::Error;

use crate::DocAssertError;

/// A failed check, as handed to a [`Reporter`].
///
/// The `Display` output is the message shown to the test author. It always
/// names the collection and the filter (or the observed count), so a failure
/// can be diagnosed without re-running the test.
#[derive(Error, Debug)]
pub enum Failure {
    /// No document matched a filter that had to exist.
    #[error("document [{filter}] not found in collection [{collection}]")]
    Missing {
        filter:     Document,
        collection: String,
    },

    /// A document matched a filter that must not exist.
    #[error("document [{filter}] found in collection [{collection}]")]
    Found {
        filter:     Document,
        collection: String,
    },

    /// The collection holds documents although it had to be empty.
    #[error("still has [{count}] document(s) in collection [{collection}]")]
    NotEmpty {
        count:      u64,
        collection: String,
    },

    /// The lookup for a filter failed.
    #[error("can not check existence for document [{filter}] in collection [{collection}]: {source}")]
    LookupFailed {
        filter:     Document,
        collection: String,
        source:     DocAssertError,
    },

    /// The upsert that should have created a document failed.
    #[error("can not ensure document [{filter}] in collection [{collection}]: {source}")]
    WriteFailed {
        filter:     Document,
        collection: String,
        source:     DocAssertError,
    },

    /// Dropping the collection failed.
    #[error("can not drop the collection [{collection}]: {source}")]
    DropFailed {
        collection: String,
        source:     DocAssertError,
    },

    /// Counting the documents failed.
    #[error("can not count the collection [{collection}]: {source}")]
    CountFailed {
        collection: String,
        source:     DocAssertError,
    },

    /// A filter value could not be encoded. `position` is its zero-based index
    /// in the argument list.
    #[error("can not encode filter #{position} for collection [{collection}]: {source}")]
    EncodeFailed {
        position:   usize,
        collection: String,
        source:     DocAssertError,
    },
}

/// Coarse classification of a [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The remote call worked but the data did not meet the expectation.
    AssertionFailed,
    /// A find call errored.
    LookupFailed,
    /// A repair write (upsert or drop) errored.
    WriteFailed,
    /// A count call errored.
    CountFailed,
    /// A filter could not be encoded.
    EncodeFailed,
}

impl Failure {
    /// Returns the kind of this failure.
    pub const fn kind(&self) -> FailureKind {
        match *self {
            Self::Missing {
                ..
            } |
            Self::Found {
                ..
            } |
            Self::NotEmpty {
                ..
            } => FailureKind::AssertionFailed,
            Self::LookupFailed {
                ..
            } => FailureKind::LookupFailed,
            Self::WriteFailed {
                ..
            } |
            Self::DropFailed {
                ..
            } => FailureKind::WriteFailed,
            Self::CountFailed {
                ..
            } => FailureKind::CountFailed,
            Self::EncodeFailed {
                ..
            } => FailureKind::EncodeFailed,
        }
    }

    /// Name of the collection the failure is about.
    pub fn collection(&self) -> &str {
        match *self {
            Self::Missing {
                ref collection, ..
            } |
            Self::Found {
                ref collection, ..
            } |
            Self::NotEmpty {
                ref collection, ..
            } |
            Self::LookupFailed {
                ref collection, ..
            } |
            Self::WriteFailed {
                ref collection, ..
            } |
            Self::DropFailed {
                ref collection, ..
            } |
            Self::CountFailed {
                ref collection, ..
            } |
            Self::EncodeFailed {
                ref collection, ..
            } => collection,
        }
    }
}

/// The channel a failure was reported through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The test stops at the failing check.
    Fatal,
    /// The failure is recorded and the test keeps running.
    NonFatal,
}

/// The host test framework's failure reporting capability.
///
/// `fatal` must not return: the statement after a fatal check never runs.
/// `non_fatal` marks the test as failed and returns.
pub trait Reporter {
    /// Fail the running test now.
    fn fatal(&self, failure: Failure) -> !;

    /// Mark the running test as failed and keep going.
    fn non_fatal(&self, failure: Failure);
}

/// The default reporter for `#[test]` and `#[tokio::test]` functions.
///
/// Fatal failures panic on the spot, which is how a Rust test stops. Non-fatal
/// failures are recorded; when the reporter goes out of scope at the end of
/// the test it panics with every recorded message, so the test fails after
/// all of its statements ran.
///
/// # Example
///
/// ```rust,should_panic
/// use bson::doc;
/// use docassert::{bind, MemoryCollection, TestReporter};
///
/// # async fn example() {
/// let t = TestReporter::new("people_are_cleaned_up");
/// let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice" }]);
///
/// bind(&t, &people).assert().empty().await;
/// assert!(t.failed());
/// // `t` panics here with "still has [1] document(s) in collection [person]"
/// # }
/// # futures::executor::block_on(example());
/// ```
#[derive(Debug)]
pub struct TestReporter {
    /// Name of the test, prefixed to panic messages.
    name:     String,
    /// Messages of the non-fatal failures recorded so far.
    failures: Mutex<Vec<String>>,
}

impl TestReporter {
    /// Creates a reporter for the test called `name`.
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name:     name.into(),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Creates a reporter named after the current thread.
    ///
    /// The libtest harness runs each test on a thread named after the test
    /// path, so this picks up names like `tests::people_are_cleaned_up`.
    pub fn current() -> Self {
        let thread = thread::current();
        Self::new(thread.name().unwrap_or("<unnamed>"))
    }

    /// Name of the test this reporter belongs to.
    pub fn name(&self) -> &str { &self.name }

    /// Returns true once a non-fatal failure has been recorded.
    pub fn failed(&self) -> bool {
        !self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Messages of the non-fatal failures recorded so far.
    pub fn failures(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes the recorded failures, disarming the end-of-test panic.
    pub fn into_failures(self) -> Vec<String> { self.take_failures() }

    /// Empties the failure record.
    fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Reporter for TestReporter {
    /// Panics with the failure. Failures recorded earlier are appended, since
    /// the end-of-test check does not run while the test unwinds.
    #[allow(clippy::panic, reason = "panicking is how a Rust test fails immediately")]
    fn fatal(&self, failure: Failure) -> ! {
        let earlier = self.take_failures();
        if earlier.is_empty() {
            panic!("{}: {}", self.name, failure);
        }
        panic!(
            "{}: {}\n{} recorded {} earlier failure(s):\n{}",
            self.name,
            failure,
            self.name,
            earlier.len(),
            earlier.join("\n")
        )
    }

    fn non_fatal(&self, failure: Failure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure.to_string());
    }
}

impl Drop for TestReporter {
    #[allow(clippy::panic, reason = "recorded failures fail the test when it ends")]
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }

        let failures = self.take_failures();
        if !failures.is_empty() {
            panic!(
                "{} recorded {} failure(s):\n{}",
                self.name,
                failures.len(),
                failures.join("\n")
            );
        }
    }
}

/// A report captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// The channel the failure went through.
    pub channel: Channel,
    /// What kind of failure it was.
    pub kind:    FailureKind,
    /// The rendered failure message.
    pub message: String,
}

/// Unwind payload used by [`RecordingReporter::fatal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted;

/// A reporter that records every report instead of failing the test.
///
/// `fatal` records the report and then unwinds with a [`Halted`] payload
/// (without running the panic hook), so a fatal check still stops the chain.
/// Catch the unwind with `std::panic::catch_unwind` or
/// `futures::FutureExt::catch_unwind` to inspect what happened.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    /// Every report received so far.
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    /// Creates an empty recorder.
    pub fn new() -> Self { Self::default() }

    /// Every report received so far, oldest first.
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The messages of every report, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .map(|report| report.message)
            .collect()
    }

    /// Returns true if nothing was reported.
    pub fn is_clean(&self) -> bool {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Returns true if a fatal report was received.
    pub fn halted(&self) -> bool {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|report| report.channel == Channel::Fatal)
    }

    /// Appends a report.
    fn record(&self, channel: Channel, failure: &Failure) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Report {
                channel,
                kind: failure.kind(),
                message: failure.to_string(),
            });
    }
}

impl Reporter for RecordingReporter {
    fn fatal(&self, failure: Failure) -> ! {
        self.record(Channel::Fatal, &failure);
        panic::resume_unwind(Box::new(Halted))
    }

    fn non_fatal(&self, failure: Failure) { self.record(Channel::NonFatal, &failure); }
}

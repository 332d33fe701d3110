// ETWSpy - app/trace.rs
//
// ETW session lifecycle. Wraps the ferrisetw user and kernel traces:
// builds providers from `ProviderConfig`s, attaches the decode callback
// that turns raw records into `EventRow`s, and runs trace processing on
// background threads.
//
// Control messages (started / stopped / failed) flow to the UI over an
// unbounded mpsc channel; decoded events take the bounded queue in
// core::pipeline. Everything ETW-specific is behind cfg(windows) so the
// rest of the crate builds and tests anywhere.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::core::model::{ProviderConfig, SessionProgress};
use crate::core::pipeline::EventSender;
use crate::util::error::SessionError;

/// Owns the running session, if any, and the progress channel to the UI.
pub struct TraceManager {
    progress_tx: Sender<SessionProgress>,
    progress_rx: Receiver<SessionProgress>,
    #[cfg(windows)]
    active: Option<native::ActiveSession>,
    #[cfg(not(windows))]
    active: Option<()>,
}

impl Default for TraceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceManager {
    pub fn new() -> Self {
        let (progress_tx, progress_rx) = mpsc::channel();
        Self {
            progress_tx,
            progress_rx,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Drain pending control messages without blocking.
    pub fn poll_progress(&mut self) -> Vec<SessionProgress> {
        let mut messages = Vec::new();
        while let Ok(message) = self.progress_rx.try_recv() {
            // A processing-thread exit means the session is gone even if
            // stop_session was never called (e.g. `logman stop -ets`).
            if matches!(message, SessionProgress::Stopped | SessionProgress::Error { .. }) {
                self.active = None;
            }
            messages.push(message);
        }
        messages
    }

    /// Start a named real-time session for the given providers.
    ///
    /// Returns synchronously once the native session is registered; the
    /// processing threads then report through the progress channel.
    pub fn start_session(
        &mut self,
        configs: &[ProviderConfig],
        sender: EventSender,
    ) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        if configs.is_empty() {
            return Err(SessionError::NoProviders);
        }

        self.active = Some(self.start_native(configs, sender)?);
        let _ = self.progress_tx.send(SessionProgress::Started {
            providers: configs.len(),
        });
        tracing::info!(providers = configs.len(), "Trace session started");
        Ok(())
    }

    /// Stop the running session and join the processing threads with a
    /// bounded wait. A no-op when nothing is running.
    pub fn stop_session(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.active.take() else {
            return Ok(());
        };
        self.stop_native(session)?;
        let _ = self.progress_tx.send(SessionProgress::Stopped);
        tracing::info!("Trace session stopped");
        Ok(())
    }

    #[cfg(windows)]
    fn start_native(
        &self,
        configs: &[ProviderConfig],
        sender: EventSender,
    ) -> Result<native::ActiveSession, SessionError> {
        native::start(configs, sender, self.progress_tx.clone())
    }

    #[cfg(windows)]
    fn stop_native(&self, session: native::ActiveSession) -> Result<(), SessionError> {
        native::stop(session)
    }

    #[cfg(not(windows))]
    fn start_native(
        &self,
        _configs: &[ProviderConfig],
        _sender: EventSender,
    ) -> Result<(), SessionError> {
        Err(SessionError::StartFailed {
            message: "ETW tracing requires Windows".to_string(),
            sessions_exhausted: false,
        })
    }

    #[cfg(not(windows))]
    fn stop_native(&self, _session: ()) -> Result<(), SessionError> {
        Ok(())
    }
}

// =============================================================================
// Native session (Windows)
// =============================================================================

#[cfg(windows)]
mod native {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc::Sender;
    use std::sync::Arc;
    use std::thread::JoinHandle;
    use std::time::{Duration, Instant};

    use chrono::{DateTime, TimeZone, Utc};
    use ferrisetw::provider::kernel_providers::{self, KernelProvider};
    use ferrisetw::provider::{EventFilter, Provider, ProviderBuilder, TraceFlags};
    use ferrisetw::schema_locator::SchemaLocator;
    use ferrisetw::trace::{TraceError, TraceTrait};
    use ferrisetw::{
        EventRecord, EventSerializer, EventSerializerOptions, KernelTrace, UserTrace, GUID,
    };

    use crate::core::model::{EventRow, ProviderConfig, SessionProgress, TraceLevel};
    use crate::core::pipeline::EventSender;
    use crate::util::constants::{SESSION_NAME, SESSION_STOP_TIMEOUT_MS};
    use crate::util::error::SessionError;

    /// ERROR_NO_SYSTEM_RESOURCES: Windows is out of concurrent ETW
    /// session slots (64 machine-wide).
    const ERROR_NO_SYSTEM_RESOURCES: i32 = 1450;

    /// Kernel enable-flag bits mapped to ferrisetw's pre-built kernel
    /// providers. Bits without a mapping are logged and skipped.
    static KERNEL_FLAG_PROVIDERS: &[(u32, &KernelProvider)] = &[
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_PROCESS,
            &kernel_providers::PROCESS_PROVIDER,
        ),
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_THREAD,
            &kernel_providers::THREAD_PROVIDER,
        ),
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_IMAGE_LOAD,
            &kernel_providers::IMAGE_LOAD_PROVIDER,
        ),
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_DISK_IO,
            &kernel_providers::DISK_IO_PROVIDER,
        ),
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_FILE_IO,
            &kernel_providers::FILE_IO_PROVIDER,
        ),
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_NETWORK_TCPIP,
            &kernel_providers::TCP_IP_PROVIDER,
        ),
        (
            kernel_providers::kernel_flags::EVENT_TRACE_FLAG_REGISTRY,
            &kernel_providers::REGISTRY_PROVIDER,
        ),
    ];

    pub struct ActiveSession {
        user_trace: Option<UserTrace>,
        kernel_trace: Option<KernelTrace>,
        threads: Vec<JoinHandle<()>>,
    }

    pub fn start(
        configs: &[ProviderConfig],
        sender: EventSender,
        progress_tx: Sender<SessionProgress>,
    ) -> Result<ActiveSession, SessionError> {
        let names = name_table(configs);
        let next_id = Arc::new(AtomicU64::new(1));

        let user_configs: Vec<&ProviderConfig> =
            configs.iter().filter(|c| !c.is_kernel()).collect();
        let kernel_flags: u32 = configs
            .iter()
            .filter(|c| c.is_kernel())
            .fold(0, |acc, c| acc | c.kernel_flags);

        let mut session = ActiveSession {
            user_trace: None,
            kernel_trace: None,
            threads: Vec::new(),
        };

        if !user_configs.is_empty() {
            let mut builder = UserTrace::new().named(SESSION_NAME.to_string());
            for config in &user_configs {
                builder = builder.enable(build_user_provider(
                    config,
                    sender.clone(),
                    Arc::clone(&names),
                    Arc::clone(&next_id),
                ));
            }

            let (trace, handle) = builder.start().map_err(start_error)?;
            session.user_trace = Some(trace);

            let tx = progress_tx.clone();
            session.threads.push(std::thread::spawn(move || {
                if let Err(e) = UserTrace::process_from_handle(handle) {
                    tracing::warn!(error = ?e, "User trace processing ended with error");
                    let _ = tx.send(SessionProgress::Error {
                        message: format!("{e:?}"),
                        sessions_exhausted: is_sessions_exhausted(&e),
                    });
                }
            }));
        }

        if kernel_flags != 0 {
            match build_kernel_trace(
                kernel_flags,
                sender,
                Arc::clone(&names),
                next_id,
                progress_tx,
            ) {
                Ok((trace, thread)) => {
                    session.kernel_trace = Some(trace);
                    session.threads.push(thread);
                }
                Err(e) => {
                    // Roll back the user trace so a half-started session
                    // does not leak an OS slot.
                    if let Some(user) = session.user_trace.take() {
                        let _ = user.stop();
                    }
                    return Err(e);
                }
            }
        }

        Ok(session)
    }

    pub fn stop(mut session: ActiveSession) -> Result<(), SessionError> {
        let mut failure: Option<String> = None;

        if let Some(trace) = session.user_trace.take() {
            if let Err(e) = trace.stop() {
                failure = Some(format!("{e:?}"));
            }
        }
        if let Some(trace) = session.kernel_trace.take() {
            if let Err(e) = trace.stop() {
                failure.get_or_insert_with(|| format!("{e:?}"));
            }
        }

        // The processing threads exit once ProcessTrace observes the closed
        // session; wait briefly rather than forever.
        let deadline = Instant::now() + Duration::from_millis(SESSION_STOP_TIMEOUT_MS);
        for thread in session.threads {
            while !thread.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(50));
            }
            if thread.is_finished() {
                let _ = thread.join();
            } else {
                tracing::warn!("Trace processing thread did not exit in time; detaching");
            }
        }

        match failure {
            Some(message) => Err(SessionError::StopFailed { message }),
            None => Ok(()),
        }
    }

    fn build_kernel_trace(
        kernel_flags: u32,
        sender: EventSender,
        names: Arc<HashMap<String, String>>,
        next_id: Arc<AtomicU64>,
        progress_tx: Sender<SessionProgress>,
    ) -> Result<(KernelTrace, JoinHandle<()>), SessionError> {
        let mut builder = KernelTrace::new().named(format!("{SESSION_NAME}-Kernel"));
        let mut mapped = 0u32;

        for (flag, provider) in KERNEL_FLAG_PROVIDERS {
            if kernel_flags & flag == 0 {
                continue;
            }
            mapped |= flag;
            let provider_sender = sender.clone();
            let provider_names = Arc::clone(&names);
            let provider_next_id = Arc::clone(&next_id);
            builder = builder.enable(
                Provider::kernel(provider)
                    .add_callback(move |record: &EventRecord, locator: &SchemaLocator| {
                        let row = decode_event(
                            record,
                            locator,
                            &provider_names,
                            &provider_next_id,
                        );
                        provider_sender.send(row);
                    })
                    .build(),
            );
        }

        if mapped != kernel_flags {
            tracing::warn!(
                unmapped = %format!("{:#x}", kernel_flags & !mapped),
                "Ignoring kernel flags with no known provider mapping"
            );
        }

        let (trace, handle) = builder.start().map_err(start_error)?;
        let thread = std::thread::spawn(move || {
            if let Err(e) = KernelTrace::process_from_handle(handle) {
                tracing::warn!(error = ?e, "Kernel trace processing ended with error");
                let _ = progress_tx.send(SessionProgress::Error {
                    message: format!("{e:?}"),
                    sessions_exhausted: is_sessions_exhausted(&e),
                });
            }
        });

        Ok((trace, thread))
    }

    fn build_user_provider(
        config: &ProviderConfig,
        sender: EventSender,
        names: Arc<HashMap<String, String>>,
        next_id: Arc<AtomicU64>,
    ) -> Provider {
        let mut builder: ProviderBuilder = Provider::by_guid(config.guid.as_str())
            .any(config.keywords_any)
            .all(config.keywords_all)
            .level(config.level.as_u8())
            .trace_flags(TraceFlags::from_bits_truncate(config.trace_flags));

        if !config.event_ids.is_empty() {
            // Push the event-id predicate into the OS so unwanted events
            // never reach user mode.
            let ids: Vec<u16> = config.event_ids.iter().copied().collect();
            builder = builder.add_filter(EventFilter::ByEventIds(ids));
        }

        builder
            .add_callback(move |record: &EventRecord, locator: &SchemaLocator| {
                let row = decode_event(record, locator, &names, &next_id);
                sender.send(row);
            })
            .build()
    }

    /// Build an `EventRow` from a raw record. Records without a TDH schema
    /// still yield a row; only the task and properties stay empty.
    fn decode_event(
        record: &EventRecord,
        locator: &SchemaLocator,
        names: &HashMap<String, String>,
        next_id: &AtomicU64,
    ) -> EventRow {
        let guid = format_guid(&record.provider_id());

        let (provider_name, task, properties) = match locator.event_schema(record) {
            Ok(schema) => {
                let serializer = EventSerializer::new(
                    record,
                    &schema,
                    EventSerializerOptions {
                        include_schema: false,
                        include_header: false,
                        include_extended_data: false,
                        ..Default::default()
                    },
                );
                let properties = serde_json::to_value(serializer)
                    .map(flatten_properties)
                    .unwrap_or_default();

                let schema_name = schema.provider_name();
                let name = if schema_name.is_empty() {
                    lookup_name(names, &guid)
                } else {
                    schema_name
                };
                (name, schema.task_name(), properties)
            }
            Err(_) => (lookup_name(names, &guid), String::new(), Vec::new()),
        };

        EventRow {
            id: next_id.fetch_add(1, Ordering::Relaxed),
            timestamp: filetime_to_utc(record.timestamp()),
            provider_name,
            provider_guid: guid,
            event_id: record.event_id(),
            opcode: record.opcode(),
            level: TraceLevel::from_u8(record.level()),
            process_id: record.process_id(),
            thread_id: record.thread_id(),
            task,
            properties,
        }
    }

    fn name_table(configs: &[ProviderConfig]) -> Arc<HashMap<String, String>> {
        let map = configs
            .iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| (c.guid.clone(), c.name.clone()))
            .collect();
        Arc::new(map)
    }

    fn lookup_name(names: &HashMap<String, String>, guid: &str) -> String {
        names.get(guid).cloned().unwrap_or_else(|| guid.to_string())
    }

    /// Flatten the serializer's JSON output into ordered (name, value)
    /// string pairs for display.
    fn flatten_properties(value: serde_json::Value) -> Vec<(String, String)> {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(name, v)| {
                    let rendered = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (name, rendered)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Canonical uppercase unbraced GUID string.
    fn format_guid(guid: &GUID) -> String {
        format!(
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            guid.data1,
            guid.data2,
            guid.data3,
            guid.data4[0],
            guid.data4[1],
            guid.data4[2],
            guid.data4[3],
            guid.data4[4],
            guid.data4[5],
            guid.data4[6],
            guid.data4[7],
        )
    }

    /// FILETIME (100 ns ticks since 1601-01-01) to UTC.
    fn filetime_to_utc(filetime: i64) -> DateTime<Utc> {
        const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;
        let ticks = filetime - FILETIME_UNIX_EPOCH;
        let secs = ticks.div_euclid(10_000_000);
        let nanos = (ticks.rem_euclid(10_000_000) * 100) as u32;
        Utc.timestamp_opt(secs, nanos)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn start_error(e: TraceError) -> SessionError {
        SessionError::StartFailed {
            message: format!("{e:?}"),
            sessions_exhausted: is_sessions_exhausted(&e),
        }
    }

    fn is_sessions_exhausted(e: &TraceError) -> bool {
        match e {
            TraceError::IoError(io) => io.raw_os_error() == Some(ERROR_NO_SYSTEM_RESOURCES),
            other => format!("{other:?}").contains(&ERROR_NO_SYSTEM_RESOURCES.to_string()),
        }
    }
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::EventQueue;

    #[test]
    fn test_start_with_no_providers_is_rejected() {
        let mut manager = TraceManager::new();
        let (sender, _queue) = EventQueue::with_capacity(16);
        let err = manager.start_session(&[], sender).unwrap_err();
        assert!(matches!(err, SessionError::NoProviders));
        assert!(!manager.is_running());
    }

    #[test]
    fn test_stop_without_session_is_a_no_op() {
        let mut manager = TraceManager::new();
        assert!(manager.stop_session().is_ok());
        assert!(manager.poll_progress().is_empty());
    }
}

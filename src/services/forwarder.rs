use crate::models::{ForwardEvent, ForwardRequest, ForwarderSettings};
use crate::services::acceptor::ListenerAcceptor;
use crate::services::bootstrap::SessionBootstrap;
use crate::services::channel_pool::ChannelPool;
use crate::services::log_service::EventLog;
use crate::services::observer::ForwardObserver;
use crate::services::russh_transport::RusshBackend;
use crate::services::shutdown::{ShutdownCoordinator, ShutdownStep};
use crate::services::transport::SshBackend;
use crate::services::transport_actor::TransportActor;
use crate::services::worker::{ForwardingWorker, WorkerContext, WorkerOutcome};
use crate::utils::error::{ForwardError, Result, ResultCode};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a finished run produced
#[derive(Debug)]
pub struct ForwardReport {
    pub code: ResultCode,
    /// One entry per worker; empty when setup failed
    pub outcomes: Vec<WorkerOutcome>,
    pub shutdown: Vec<ShutdownStep>,
}

/// One local port forwarding run over a single SSH session.
///
/// `run` drives setup, serves connections until every worker has finished
/// (or the run is cancelled) and always ends with a full shutdown.
pub struct PortForwarder<B: SshBackend> {
    backend: B,
    request: ForwardRequest,
    settings: ForwarderSettings,
    observer: Arc<dyn ForwardObserver>,
    log: Arc<EventLog>,
    cancel: CancellationToken,
    local_address: Mutex<Option<SocketAddr>>,
}

impl<B: SshBackend> PortForwarder<B> {
    pub fn new(
        backend: B,
        request: ForwardRequest,
        settings: ForwarderSettings,
        observer: Arc<dyn ForwardObserver>,
    ) -> Self {
        let log = EventLog::new(request.id, settings.max_log_entries).with_observer(observer.clone());
        Self {
            backend,
            request,
            settings,
            observer,
            log: Arc::new(log),
            cancel: CancellationToken::new(),
            local_address: Mutex::new(None),
        }
    }

    /// Cancelling stops the acceptor and every worker
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn event_log(&self) -> Arc<EventLog> {
        self.log.clone()
    }

    /// The listener's bound address, known once it is listening
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local_address.lock().ok().and_then(|slot| *slot)
    }

    pub fn request(&self) -> &ForwardRequest {
        &self.request
    }

    pub async fn run(&self) -> ResultCode {
        self.run_with_report().await.code
    }

    pub async fn run_with_report(&self) -> ForwardReport {
        tracing::info!(
            "Forwarding {} via {}",
            self.request.forwarding,
            self.request.display_name()
        );

        let mut resources = ShutdownCoordinator::new();
        let result = self.forward(&mut resources).await;

        let (code, outcomes) = match result {
            Ok(outcomes) => (ResultCode::Success, outcomes),
            Err(e) => {
                tracing::error!("Port forwarding failed: {}", e);
                self.observer.forwarding_failed(&e);
                (e.code(), Vec::new())
            }
        };

        let shutdown = resources.shutdown(&self.backend, &self.log).await;
        self.log.info(ForwardEvent::Finished { code: code.as_i32() });

        ForwardReport {
            code,
            outcomes,
            shutdown,
        }
    }

    /// Run on a fresh multi-threaded runtime and block until done
    pub fn run_blocking(&self) -> ResultCode {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("port-forwarder")
            .build();

        match runtime {
            Ok(runtime) => runtime.block_on(self.run()),
            Err(e) => {
                let err = ForwardError::Runtime(e);
                self.log.error(ForwardEvent::Finished { code: err.code().as_i32() }, err.to_string());
                self.observer.forwarding_failed(&err);
                self.backend.release();
                err.code()
            }
        }
    }

    async fn forward(&self, resources: &mut ShutdownCoordinator<B::Transport>) -> Result<Vec<WorkerOutcome>> {
        self.settings.validate()?;

        SessionBootstrap::new(
            &self.backend,
            &self.request,
            &self.settings,
            self.observer.clone(),
            &self.log,
        )
        .establish(resources)
        .await?;

        let forwarding = &self.request.forwarding;
        let listener = ChannelPool::bind_listener(forwarding, &self.settings, &self.log)?;
        let origin = listener.local_addr().map_err(|source| ForwardError::ListenSetup {
            address: format!("{}:{}", forwarding.bind_address, forwarding.local_port),
            source,
        })?;
        if let Ok(mut slot) = self.local_address.lock() {
            *slot = Some(origin);
        }
        resources.register_listener(listener);

        let transport = resources.transport_mut().ok_or_else(missing_session)?;
        let channels =
            ChannelPool::open_channels(transport, forwarding, origin, self.settings.channel_count, &self.log)
                .await?;
        resources.register_channels(&channels);

        let transport = resources.take_transport().ok_or_else(missing_session)?;
        let listener = resources
            .take_listener()
            .ok_or_else(|| ForwardError::ConfigError("listener missing".to_string()))?;

        let (transport_handle, actor) = TransportActor::spawn(transport, self.settings.transport_queue_depth);
        let (tickets, ticket_queue) = mpsc::channel(channels.len().max(1));
        let acceptor = ListenerAcceptor::new(
            listener,
            ticket_queue,
            self.settings.accept_poll_interval(),
            self.settings.accept_timeout(),
            self.cancel.child_token(),
            self.log.clone(),
        )
        .spawn();

        let workers: Vec<_> = channels
            .iter()
            .enumerate()
            .map(|(index, channel)| {
                ForwardingWorker::new(WorkerContext {
                    index,
                    channel: *channel,
                    transport: transport_handle.clone(),
                    tickets: tickets.clone(),
                    buffer_size: self.settings.buffer_size,
                    relay_poll_interval: self.settings.relay_poll_interval(),
                    cancel: self.cancel.child_token(),
                    log: self.log.clone(),
                })
                .spawn()
            })
            .collect();
        drop(tickets);
        drop(transport_handle);

        self.log.info(ForwardEvent::WorkersStarted {
            count: workers.len(),
        });
        self.observer.forwarding_ready();

        let mut outcomes = Vec::with_capacity(workers.len());
        for (index, joined) in futures::future::join_all(workers).await.into_iter().enumerate() {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Worker {} did not finish cleanly: {}", index, e),
            }
        }

        match acceptor.await {
            Ok(listener) => resources.register_listener(listener),
            Err(e) => tracing::error!("Acceptor task failed: {}", e),
        }
        match actor.await {
            Ok(transport) => resources.register_transport(transport),
            Err(e) => tracing::error!("Transport actor failed: {}", e),
        }

        Ok(outcomes)
    }
}

fn missing_session() -> ForwardError {
    ForwardError::ConfigError("SSH session missing after authentication".to_string())
}

/// Forward over russh and block until the run ends
pub fn forward_blocking(
    request: ForwardRequest,
    settings: ForwarderSettings,
    observer: Arc<dyn ForwardObserver>,
) -> ResultCode {
    PortForwarder::new(RusshBackend, request, settings, observer).run_blocking()
}

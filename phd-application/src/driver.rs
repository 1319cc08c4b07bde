//! Async connection driver
//!
//! A [`ConnectionDriver`] owns one [`ConnectionContext`] and its
//! [`ApduStream`] and runs them inside a single tokio task. The loop waits on
//! three sources: bytes from the stream, expired timers and commands sent
//! through a [`DriverHandle`]. Each input is handed to the context, then every
//! APDU the context queued is written out before the next wait.
//!
//! The context talks to the loop through a [`ChannelPlugin`], the
//! [`TransportPlugin`] implementation that queues outbound frames and
//! schedules timers as sleeping tasks.

use crate::context::ConnectionContext;
use crate::fsm::{FsmOutcome, FsmState};
use crate::service::{RequestCallback, RequestOutcome};
use crate::specialization::Reading;
use bytes::{Bytes, BytesMut};
use phd_asn1::{AbsoluteTime, AttributeModEntry, frame_length};
use phd_core::{PhdError, PhdResult};
use phd_transport::{ApduStream, TimerHandle, TransportPlugin};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 4096;
const COMMAND_QUEUE: usize = 32;

fn driver_stopped() -> PhdError {
    PhdError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "Connection driver stopped",
    ))
}

/// Work queued by the context for the driver loop
#[derive(Debug)]
enum Outbound {
    Apdu(Bytes),
    Disconnect,
}

/// Receiving ends of a [`ChannelPlugin`]
#[derive(Debug)]
pub struct PluginChannels {
    outbound: mpsc::UnboundedReceiver<Outbound>,
    timers: mpsc::UnboundedReceiver<TimerHandle>,
}

/// Transport plugin backed by channels into the driver loop
#[derive(Debug)]
pub struct ChannelPlugin {
    outbound: mpsc::UnboundedSender<Outbound>,
    fired: mpsc::UnboundedSender<TimerHandle>,
    timers: HashMap<TimerHandle, JoinHandle<()>>,
    next_timer: u64,
}

impl ChannelPlugin {
    /// Create a plugin and the channels the driver reads from
    pub fn new() -> (Self, PluginChannels) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let plugin = Self {
            outbound: outbound_tx,
            fired: fired_tx,
            timers: HashMap::new(),
            next_timer: 0,
        };
        let channels = PluginChannels {
            outbound: outbound_rx,
            timers: fired_rx,
        };
        (plugin, channels)
    }

    fn queue(&self, item: Outbound) -> PhdResult<()> {
        self.outbound.send(item).map_err(|_| driver_stopped())
    }
}

impl TransportPlugin for ChannelPlugin {
    fn send_apdu(&mut self, apdu: &[u8]) -> PhdResult<()> {
        self.queue(Outbound::Apdu(Bytes::copy_from_slice(apdu)))
    }

    fn disconnect(&mut self) -> PhdResult<()> {
        self.queue(Outbound::Disconnect)
    }

    fn count_timeout(&mut self, seconds: u64) -> TimerHandle {
        self.timers.retain(|_, task| !task.is_finished());
        self.next_timer += 1;
        let handle = TimerHandle(self.next_timer);
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            let _ = fired.send(handle);
        });
        self.timers.insert(handle, task);
        handle
    }

    fn reset_timeout(&mut self, handle: TimerHandle) {
        if let Some(task) = self.timers.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for ChannelPlugin {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}

/// Confirmed service a manager application can issue
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerRequest {
    /// GET attributes of an object, all of them when the list is empty
    Get {
        obj_handle: u16,
        attribute_ids: Vec<u16>,
    },
    /// Confirmed SET
    Set {
        obj_handle: u16,
        modifications: Vec<AttributeModEntry>,
    },
    /// Set the agent clock
    SetTime(AbsoluteTime),
    /// Confirmed ACTION
    Action {
        obj_handle: u16,
        action_type: u16,
        args: Vec<u8>,
    },
}

enum Command {
    Associate(oneshot::Sender<FsmOutcome>),
    SendData(Reading, oneshot::Sender<PhdResult<()>>),
    Release(oneshot::Sender<FsmOutcome>),
    Abort(oneshot::Sender<FsmOutcome>),
    Disconnect(oneshot::Sender<PhdResult<FsmOutcome>>),
    Request {
        request: ManagerRequest,
        accepted: oneshot::Sender<PhdResult<u16>>,
        outcome: oneshot::Sender<RequestOutcome>,
    },
    State(oneshot::Sender<FsmState>),
}

/// Cloneable handle controlling a running [`ConnectionDriver`]
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> PhdResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| driver_stopped())?;
        rx.await.map_err(|_| driver_stopped())
    }

    /// Agent: start the association
    pub async fn associate(&self) -> PhdResult<FsmOutcome> {
        self.call(Command::Associate).await
    }

    /// Agent: send one measurement
    pub async fn send_data(&self, reading: Reading) -> PhdResult<()> {
        self.call(|tx| Command::SendData(reading, tx)).await?
    }

    /// Release the association
    pub async fn release(&self) -> PhdResult<FsmOutcome> {
        self.call(Command::Release).await
    }

    /// Abort the association
    pub async fn abort(&self) -> PhdResult<FsmOutcome> {
        self.call(Command::Abort).await
    }

    /// Close the transport; the driver stops afterwards
    pub async fn disconnect(&self) -> PhdResult<FsmOutcome> {
        self.call(Command::Disconnect).await?
    }

    /// Current state of the connection
    pub async fn state(&self) -> PhdResult<FsmState> {
        self.call(Command::State).await
    }

    /// Manager: issue a confirmed request and wait for its outcome
    pub async fn request(&self, request: ManagerRequest) -> PhdResult<RequestOutcome> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let invoke_id = self
            .call(|accepted| Command::Request {
                request,
                accepted,
                outcome: outcome_tx,
            })
            .await??;
        log::debug!("Waiting for request 0x{:04X}", invoke_id);
        outcome_rx.await.map_err(|_| driver_stopped())
    }

    /// Check if the driver loop has ended
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Event loop of one connection
pub struct ConnectionDriver<S: ApduStream> {
    ctx: ConnectionContext,
    stream: S,
    channels: PluginChannels,
    commands: mpsc::Receiver<Command>,
    inbound: BytesMut,
    chunk: Box<[u8]>,
    accepting_commands: bool,
    stream_closed: bool,
}

impl<S: ApduStream> ConnectionDriver<S> {
    /// Bind a context to a stream
    ///
    /// # Arguments
    /// * `ctx` - Context created with the [`ChannelPlugin`] of `channels`
    /// * `channels` - Receiving side of that plugin
    /// * `stream` - Connected stream to the peer
    pub fn new(ctx: ConnectionContext, channels: PluginChannels, stream: S) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let driver = Self {
            ctx,
            stream,
            channels,
            commands: rx,
            inbound: BytesMut::with_capacity(READ_CHUNK),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            accepting_commands: true,
            stream_closed: false,
        };
        (driver, DriverHandle { commands: tx })
    }

    /// Run until the connection goes down
    ///
    /// # Returns
    /// The context in its final state
    pub async fn run(mut self) -> PhdResult<ConnectionContext> {
        let id = self.ctx.id();
        self.ctx.transport_connected()?;
        self.flush().await?;

        while self.ctx.state() != FsmState::Disconnected {
            // read() is cancel safe; frames are reassembled in `inbound`
            tokio::select! {
                read = self.stream.read(&mut self.chunk) => match read {
                    Ok(0) => {
                        log::info!("{}: peer closed the connection", id);
                        self.stream_closed = true;
                        self.ctx.transport_disconnected();
                    }
                    Ok(n) => {
                        self.inbound.extend_from_slice(&self.chunk[..n]);
                        while let Some(frame) = next_frame(&mut self.inbound) {
                            self.ctx.process_input_data(&frame);
                        }
                    }
                    Err(e) => {
                        log::warn!("{}: read failed: {}", id, e);
                        self.stream_closed = true;
                        self.ctx.transport_disconnected();
                    }
                },
                Some(handle) = self.channels.timers.recv() => {
                    self.ctx.timer_fired(handle);
                }
                command = self.commands.recv(), if self.accepting_commands => match command {
                    Some(command) => self.execute(command),
                    None => self.accepting_commands = false,
                },
            }

            if let Err(e) = self.flush().await {
                log::warn!("{}: write failed: {}", id, e);
                self.stream_closed = true;
                self.ctx.transport_disconnected();
            }
        }

        if !self.stream_closed {
            self.stream.close().await?;
        }
        log::debug!("{}: driver stopped", id);
        Ok(self.ctx)
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Associate(reply) => {
                let _ = reply.send(self.ctx.associate());
            }
            Command::SendData(reading, reply) => {
                let _ = reply.send(self.ctx.send_data(reading));
            }
            Command::Release(reply) => {
                let _ = reply.send(self.ctx.request_association_release());
            }
            Command::Abort(reply) => {
                let _ = reply.send(self.ctx.request_association_abort());
            }
            Command::Disconnect(reply) => {
                let _ = reply.send(self.ctx.disconnect());
            }
            Command::State(reply) => {
                let _ = reply.send(self.ctx.state());
            }
            Command::Request {
                request,
                accepted,
                outcome,
            } => {
                let callback: RequestCallback = Box::new(move |result| {
                    let _ = outcome.send(result);
                });
                let result = match request {
                    ManagerRequest::Get {
                        obj_handle,
                        attribute_ids,
                    } => self.ctx.request_get(obj_handle, attribute_ids, callback),
                    ManagerRequest::Set {
                        obj_handle,
                        modifications,
                    } => self.ctx.request_set(obj_handle, modifications, callback),
                    ManagerRequest::SetTime(time) => self.ctx.request_set_time(time, callback),
                    ManagerRequest::Action {
                        obj_handle,
                        action_type,
                        args,
                    } => self.ctx.request_action(obj_handle, action_type, args, callback),
                };
                let _ = accepted.send(result);
            }
        }
    }

    /// Write everything the context queued
    async fn flush(&mut self) -> PhdResult<()> {
        while let Ok(item) = self.channels.outbound.try_recv() {
            match item {
                Outbound::Apdu(frame) if !self.stream_closed => {
                    self.stream.write_apdu(&frame).await?;
                }
                Outbound::Apdu(frame) => {
                    log::debug!("dropping {} bytes queued after close", frame.len());
                }
                Outbound::Disconnect => {
                    if !self.stream_closed {
                        self.stream_closed = true;
                        self.stream.close().await?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Split one complete APDU off the front of `buffer`
fn next_frame(buffer: &mut BytesMut) -> Option<Bytes> {
    let length = frame_length(&buffer[..])?;
    if buffer.len() < length {
        return None;
    }
    Some(buffer.split_to(length).freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::configurations::ConfigurationRegistry;
    use crate::context::tests::{AGENT_ID, MANAGER_ID};
    use crate::listener::{ChannelListener, ConnectionEvent, ContextId};
    use crate::specialization::PulseOximeter;
    use phd_core::Role;
    use phd_core::protocol::MDS_HANDLE;
    use phd_transport::memory_pair;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn wait_for(
        events: &mut UnboundedReceiver<ConnectionEvent>,
        wanted: impl Fn(&ConnectionEvent) -> bool,
    ) -> ConnectionEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event timeout")
                .expect("listener closed");
            if wanted(&event) {
                return event;
            }
        }
    }

    #[test]
    fn test_next_frame_reassembly() {
        let mut buffer = BytesMut::from(&[0xE5, 0x00, 0x00][..]);
        assert!(next_frame(&mut buffer).is_none());
        buffer.extend_from_slice(&[0x02, 0x00, 0x00, 0xE4]);
        assert_eq!(
            &next_frame(&mut buffer).unwrap()[..],
            &[0xE5, 0x00, 0x00, 0x02, 0x00, 0x00]
        );
        assert_eq!(&buffer[..], &[0xE4]);

        // empty body and a second frame in the same read
        buffer.extend_from_slice(&[0x00, 0x00, 0x00, 0xE6, 0x00, 0x00, 0x02, 0x00]);
        assert_eq!(&next_frame(&mut buffer).unwrap()[..], &[0xE4, 0x00, 0x00, 0x00]);
        assert!(next_frame(&mut buffer).is_none());
        buffer.extend_from_slice(&[0x00]);
        assert_eq!(next_frame(&mut buffer).unwrap().len(), 6);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_channel_plugin_timers() {
        let (mut plugin, mut channels) = ChannelPlugin::new();
        let cancelled = plugin.count_timeout(0);
        plugin.reset_timeout(cancelled);
        let kept = plugin.count_timeout(0);
        assert_ne!(cancelled, kept);
        assert_eq!(channels.timers.recv().await, Some(kept));

        plugin.send_apdu(&[0xE5, 0x00, 0x00, 0x00]).unwrap();
        plugin.disconnect().unwrap();
        assert!(matches!(channels.outbound.try_recv(), Ok(Outbound::Apdu(_))));
        assert!(matches!(channels.outbound.try_recv(), Ok(Outbound::Disconnect)));

        drop(channels);
        assert!(plugin.send_apdu(&[0xE5, 0x00, 0x00, 0x00]).is_err());
    }

    #[tokio::test]
    async fn test_agent_and_manager_over_memory_pipe() {
        let (agent_stream, manager_stream) = memory_pair();

        let (plugin, channels) = ChannelPlugin::new();
        let mut manager = ConnectionContext::manager(
            ContextId(1),
            Box::new(plugin),
            EngineConfig::for_role(Role::Manager).with_system_id(MANAGER_ID),
            Arc::new(ConfigurationRegistry::with_defaults()),
        );
        let (listener, mut manager_events) = ChannelListener::new();
        manager.add_listener(Arc::new(listener));
        let (driver, manager_handle) = ConnectionDriver::new(manager, channels, manager_stream);
        let manager_task = tokio::spawn(driver.run());

        let (plugin, channels) = ChannelPlugin::new();
        let mut agent = ConnectionContext::agent(
            ContextId(2),
            Box::new(plugin),
            EngineConfig::for_role(Role::Agent).with_system_id(AGENT_ID),
            Arc::new(PulseOximeter::new(0x0190)),
        );
        let (listener, mut agent_events) = ChannelListener::new();
        agent.add_listener(Arc::new(listener));
        let (driver, agent_handle) = ConnectionDriver::new(agent, channels, agent_stream);
        let agent_task = tokio::spawn(driver.run());

        assert_eq!(agent_handle.associate().await.unwrap(), FsmOutcome::Changed);
        wait_for(&mut agent_events, |e| matches!(e, ConnectionEvent::Associated { .. })).await;
        wait_for(&mut manager_events, |e| matches!(e, ConnectionEvent::Associated { .. })).await;

        let time = AbsoluteTime {
            century: 0x20,
            year: 0x26,
            month: 0x10,
            day: 0x19,
            hour: 0x12,
            minute: 0x00,
            second: 0x00,
            sec_fractions: 0x00,
        };
        agent_handle
            .send_data(PulseOximeter::reading(97.0, 72.0, time))
            .await
            .unwrap();
        let event = wait_for(&mut manager_events, |e| {
            matches!(e, ConnectionEvent::Measurement { .. })
        })
        .await;
        let ConnectionEvent::Measurement { report, .. } = event else {
            unreachable!()
        };
        assert_eq!(report.observations.len(), 2);

        let outcome = manager_handle
            .request(ManagerRequest::Get {
                obj_handle: MDS_HANDLE,
                attribute_ids: Vec::new(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Response(_)));

        assert_eq!(manager_handle.release().await.unwrap(), FsmOutcome::Changed);
        wait_for(&mut agent_events, |e| matches!(e, ConnectionEvent::Unavailable { .. })).await;
        wait_for(&mut manager_events, |e| {
            matches!(
                e,
                ConnectionEvent::StateChanged {
                    to: FsmState::Unassociated,
                    ..
                }
            )
        })
        .await;

        manager_handle.disconnect().await.unwrap();
        let manager = manager_task.await.unwrap().unwrap();
        assert_eq!(manager.state(), FsmState::Disconnected);
        let agent = agent_task.await.unwrap().unwrap();
        assert_eq!(agent.state(), FsmState::Disconnected);
        assert!(agent_handle.is_closed());
        assert!(agent_handle.state().await.is_err());
    }
}

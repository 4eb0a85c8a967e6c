use super::reader::publish;
use super::{BarcodeReader, ReaderCommand, ShutdownReason};
use crate::events::ScanEvent;
use chrono::Utc;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl BarcodeReader {
    /// Present the scanner and serve host commands until a signal, a quit
    /// request, or the command channel closing. The session is stopped
    /// before returning; the reader stays usable and may be started again.
    pub async fn run(
        &self,
        mut commands: mpsc::UnboundedReceiver<ReaderCommand>,
    ) -> ShutdownReason {
        info!("Barcode reader is running");

        let (shutdown_sender, mut shutdown_receiver) = oneshot::channel();
        let signal_token = CancellationToken::new();
        self.setup_signal_handlers(shutdown_sender, signal_token.clone());

        if let Err(e) = self.present().await {
            warn!("Start task failed: {}", e);
        }

        let reason = loop {
            tokio::select! {
                reason = &mut shutdown_receiver => {
                    break reason.unwrap_or_else(|_| ShutdownReason::Signal("unknown".to_string()));
                }
                command = commands.recv() => match command {
                    Some(ReaderCommand::Quit) => break ShutdownReason::UserRequest,
                    Some(command) => self.handle_command(command).await,
                    None => break ShutdownReason::InputClosed,
                },
            }
        };

        info!("Shutdown initiated: {:?}", reason);
        publish(
            &self.event_bus,
            ScanEvent::ShutdownRequested {
                reason: format!("{:?}", reason),
                timestamp: Utc::now(),
            },
        );

        signal_token.cancel();
        self.stop().await;

        info!("Barcode reader shutdown complete");
        reason
    }

    async fn handle_command(&self, command: ReaderCommand) {
        debug!("Handling command: {:?}", command);
        match command {
            ReaderCommand::ManualEntry(text) => {
                self.submit_manual(&text);
            }
            ReaderCommand::SwitchCamera => {
                self.change_camera_mode().await;
            }
            ReaderCommand::ToggleTorch => {
                self.toggle_torch().await;
            }
            ReaderCommand::Quit => {}
        }
    }

    fn setup_signal_handlers(
        &self,
        shutdown_sender: oneshot::Sender<ShutdownReason>,
        token: CancellationToken,
    ) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // SIGTERM (systemd stop), Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            let token = token.clone();
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };

                tokio::select! {
                    _ = token.cancelled() => {}
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                            let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                        }
                    }
                }
            });
        }

        // SIGINT (Ctrl+C)
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                Ok(()) = signal::ctrl_c() => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    if let Some(sender) = shutdown_sender.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                }
            }
        });
    }
}

use crate::app::ReaderCommand;
use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Terminal front end for the scanner.
///
/// Typed characters accumulate into a manual entry submitted with Enter.
/// F1 switches camera, F2 toggles the torch, Esc or Ctrl+C quits.
pub struct KeyboardInputHandler {
    commands: mpsc::UnboundedSender<ReaderCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::UnboundedSender<ReaderCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input - type a code and press Enter, F1 camera, F2 torch, Esc quit");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");
            let mut entry = ManualEntryBuffer::default();

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(command) = entry.handle_key(key_event) else {
                            continue;
                        };
                        let quit = command == ReaderCommand::Quit;

                        if commands.send(command).is_err() {
                            debug!("Reader is gone; keyboard handler exiting");
                            break;
                        }
                        if quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // let the blocking task observe the token and leave raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

/// Line editor state for manual entries
#[derive(Debug, Default)]
struct ManualEntryBuffer {
    text: String,
}

impl ManualEntryBuffer {
    fn handle_key(&mut self, key: KeyEvent) -> Option<ReaderCommand> {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(ReaderCommand::Quit)
            }
            KeyCode::Char(c) => {
                self.text.push(c);
                None
            }
            KeyCode::Backspace => {
                self.text.pop();
                None
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.text);
                if text.is_empty() {
                    None
                } else {
                    Some(ReaderCommand::ManualEntry(text))
                }
            }
            KeyCode::F(1) => Some(ReaderCommand::SwitchCamera),
            KeyCode::F(2) => Some(ReaderCommand::ToggleTorch),
            KeyCode::Esc => Some(ReaderCommand::Quit),
            other => {
                debug!("Key pressed: {:?}", other);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typed_text_submitted_on_enter() {
        let mut entry = ManualEntryBuffer::default();

        for c in "40063813".chars() {
            assert_eq!(entry.handle_key(press(KeyCode::Char(c))), None);
        }
        entry.handle_key(press(KeyCode::Backspace));

        assert_eq!(
            entry.handle_key(press(KeyCode::Enter)),
            Some(ReaderCommand::ManualEntry("4006381".to_string()))
        );
        assert_eq!(entry.handle_key(press(KeyCode::Enter)), None);
    }

    #[test]
    fn test_function_keys_map_to_controls() {
        let mut entry = ManualEntryBuffer::default();

        assert_eq!(
            entry.handle_key(press(KeyCode::F(1))),
            Some(ReaderCommand::SwitchCamera)
        );
        assert_eq!(
            entry.handle_key(press(KeyCode::F(2))),
            Some(ReaderCommand::ToggleTorch)
        );
        assert_eq!(entry.handle_key(press(KeyCode::Esc)), Some(ReaderCommand::Quit));
        assert_eq!(
            entry.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ReaderCommand::Quit)
        );
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handler = KeyboardInputHandler::new(tx);

        assert!(!handler.cancellation_token.is_cancelled());
        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}

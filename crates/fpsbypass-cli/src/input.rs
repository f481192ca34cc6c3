use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use tracing::debug;

/// Spawn a thread that forwards each line of `reader` over a channel.
///
/// Reading blocks, so the prompt polls the channel instead and stays
/// responsive to shutdown and to the game exiting. The channel disconnects
/// at end of input.
pub fn spawn_line_reader<R>(reader: R) -> (Receiver<String>, JoinHandle<()>)
where
    R: BufRead + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        debug!("Input reader started");

        for line in reader.lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.send(line).is_err() {
                break;
            }
        }

        debug!("Input reader stopped");
    });
    (receiver, handle)
}

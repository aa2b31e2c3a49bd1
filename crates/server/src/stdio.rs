//! Newline-delimited JSON over a reader/writer pair (stdin/stdout in production).

use crate::dispatcher::Dispatcher;
use crate::protocol::CallEnvelope;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Serve requests one at a time until end of input or `shutdown`.
///
/// Undecodable lines are logged and skipped; a response that cannot be encoded is logged and
/// dropped. Only I/O errors on the streams themselves end the loop with an error.
///
/// # Errors
///
/// Returns the underlying I/O error if reading or writing fails.
pub async fn serve<R, W>(
    dispatcher: &Dispatcher,
    mut reader: R,
    mut writer: W,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::new();
    info!("stdio transport ready");

    loop {
        frame.clear();
        let read = tokio::select! {
            () = shutdown.cancelled() => {
                info!("stdio transport shutting down");
                break;
            }
            read = reader.read_until(b'\n', &mut frame) => read?,
        };
        if read == 0 {
            debug!("stdin closed");
            break;
        }
        if frame.trim_ascii().is_empty() {
            continue;
        }

        // Invalid UTF-8 is an ordinary decode failure here.
        let call: CallEnvelope = match serde_json::from_slice(&frame) {
            Ok(call) => call,
            Err(e) => {
                warn!(error = %e, "failed to decode request; skipping");
                continue;
            }
        };

        let response = dispatcher.dispatch(call).await;
        let mut encoded = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id = %response.id, error = %e, "failed to encode response; dropping");
                continue;
            }
        };
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    Ok(())
}

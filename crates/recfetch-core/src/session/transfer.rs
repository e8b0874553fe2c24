//! Streaming file transfer from the camera into a staged file.

use std::io::Write;
use std::time::Duration;

use super::CameraSession;
use crate::control::CancelToken;
use crate::fetcher::SegmentSource;
use crate::recording::RecordingDescriptor;
use crate::retry::SegmentError;
use crate::storage::StagedFile;

/// Hard wall-clock cap for one transfer; the low-speed limit normally trips first.
const TRANSFER_HARD_TIMEOUT: Duration = Duration::from_secs(3600);

impl SegmentSource for CameraSession {
    /// GET `RPC_Loadfile<remote_path>` and stream the body into `out`.
    /// Returns the number of bytes received.
    fn fetch_into(
        &self,
        descriptor: &RecordingDescriptor,
        out: &mut StagedFile,
        cancel: &CancelToken,
    ) -> Result<u64, SegmentError> {
        let url = self.file_url(&descriptor.remote_path);
        let mut easy = self
            .easy(&url, TRANSFER_HARD_TIMEOUT)
            .map_err(SegmentError::Curl)?;
        // Abort if throughput stays below 1 KiB/s for the configured window.
        easy.low_speed_limit(1024).map_err(SegmentError::Curl)?;
        easy.low_speed_time(self.timeouts.low_speed)
            .map_err(SegmentError::Curl)?;
        easy.progress(true).map_err(SegmentError::Curl)?;

        let mut storage_error: Option<std::io::Error> = None;
        let perform_result = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    if cancel.is_cancelled() {
                        return Ok(0);
                    }
                    match out.write_all(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            storage_error = Some(e);
                            Ok(0) // abort transfer
                        }
                    }
                })
                .map_err(SegmentError::Curl)?;
            transfer
                .progress_function(|_, _, _, _| !cancel.is_cancelled())
                .map_err(SegmentError::Curl)?;
            transfer.perform()
        };

        if let Err(e) = perform_result {
            if cancel.is_cancelled() {
                return Err(SegmentError::Cancelled);
            }
            if e.is_write_error() {
                if let Some(io_err) = storage_error.take() {
                    return Err(SegmentError::Storage(io_err));
                }
            }
            return Err(SegmentError::Curl(e));
        }

        let code = easy.response_code().map_err(SegmentError::Curl)?;
        if !(200..300).contains(&code) {
            return Err(SegmentError::Http(code));
        }

        let received = out.bytes_written();
        let announced = easy.content_length_download().map_err(SegmentError::Curl)?;
        if announced >= 0.0 {
            let expected = announced as u64;
            if received != expected {
                return Err(SegmentError::PartialTransfer { expected, received });
            }
        }
        Ok(received)
    }
}

use crate::types::ArtifactDescriptor;

/// Subject line for a new-recording alert.
pub fn notification_subject(artifact: &ArtifactDescriptor) -> String {
    format!("Security Alert - Video Recording {}", artifact.filename)
}

/// HTML body for a new-recording alert.
///
/// Kept self-contained: everything the operator needs is in the message even
/// if the attachment is stripped by their mail setup.
pub fn notification_body(artifact: &ArtifactDescriptor) -> String {
    let size_mb = artifact.size_bytes as f64 / 1024.0 / 1024.0;
    format!(
        "<h2>Security Recording Alert</h2>\n\
         <p>A new security recording has been captured:</p>\n\
         <ul>\n\
         <li><strong>Filename:</strong> {}</li>\n\
         <li><strong>Start Time:</strong> {}</li>\n\
         <li><strong>Duration:</strong> {} seconds</li>\n\
         <li><strong>Camera:</strong> {}</li>\n\
         <li><strong>File Size:</strong> {size_mb:.2} MB</li>\n\
         </ul>\n\
         <p>The video file is attached to this email.</p>",
        artifact.filename,
        artifact.start_time.to_rfc3339(),
        artifact.duration_seconds,
        artifact.camera_id.as_str(),
    )
}

use crate::text::{BlockStart, ParameterRecord, TextDocument, find_param, read_parameter_block};

/// Marker identifying the first line of a sensor channel sub-block.
pub const CHANNEL_MARKER: &str = "Channel";

/// Lines containing this marker are never channel starts.
pub const CHANNEL_STOP_MARKER: &str = "Data";

/// Returns the line numbers of channel sub-blocks following `header`.
///
/// Every line after the header that contains [`CHANNEL_MARKER`] but not [`CHANNEL_STOP_MARKER`]
/// starts a block. The scan runs to the end of the document. A missing header yields no blocks.
pub fn find_channel_blocks(doc: &TextDocument, header: &str) -> Vec<usize> {
    let Some(found) = find_param(doc, header) else {
        return Vec::new();
    };

    doc.lines_from(found.line_number + 1)
        .filter(|(_, line)| line.contains(CHANNEL_MARKER) && !line.contains(CHANNEL_STOP_MARKER))
        .map(|(line_number, _)| line_number)
        .collect()
}

/// Reads the channel sub-block starting at `line_number`, including the channel line itself.
pub fn read_channel_block(doc: &TextDocument, line_number: usize) -> Option<ParameterRecord> {
    let previous = line_number.checked_sub(1)?;
    doc.line(line_number)?;

    read_parameter_block(doc, BlockStart::Line(previous), 0)
}

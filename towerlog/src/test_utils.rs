//! Fixture exports shaped like decrypted NRG logger files.

/// Returns an export for `site` holding two measurement rows.
pub fn sample_export(site: &str) -> String {
    export_with_measurements(
        site,
        &[
            "2024-01-01 00:00:00\t5.2\t180",
            "2024-01-01 00:10:00\t5.6\t182",
        ],
    )
}

/// Returns an export for `site` whose measurement section holds `rows`.
///
/// Each row is a tab-delimited line with a timestamp, a wind speed and a direction.
pub fn export_with_measurements(site: &str, rows: &[&str]) -> String {
    let mut export = format!(
        "Export Parameters\n\
         Site Number: {site}\n\
         Export Date: 2024-01-02 08:00:00\n\
         \n\
         Site Properties\n\
         Site Description: Ridge Tower {site}\n\
         Elevation: 1200\n\
         \n\
         Logger History\n\
         Model: 8206\n\
         Serial Number: 820600{site}\n\
         \n\
         Sensor History\n\
         Channel: 1\n\
         Type: Anemometer\n\
         Height: 80 m\n\
         \n\
         Channel: 2\n\
         Type: Vane\n\
         Height: 78 m\n\
         \n\
         Data\n\
         Timestamp\tCh1_Anem_80.00m_Avg\tCh2_Vane_78.00m_Avg\n"
    );

    for row in rows {
        export.push_str(row);
        export.push('\n');
    }

    export
}

//! Whole-library export and import as a single JSON document.

use super::library::Playlists;
use super::stats::PlayStatistics;
use super::{HistoryEntry, KEY_PLAYLISTS, KEY_STATISTICS, Setting, Storage, now_rfc3339, put_value};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    #[serde(default)]
    pub playlists: Option<Playlists>,
    #[serde(default)]
    pub play_history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub play_statistics: Option<PlayStatistics>,
    #[serde(default)]
    pub settings: Option<ExportSettings>,
    #[serde(default)]
    pub export_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub play_mode: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl ExportSettings {
    fn pairs(&self) -> [(Setting, Option<&String>); 4] {
        [
            (Setting::Theme, self.theme.as_ref()),
            (Setting::PlayMode, self.play_mode.as_ref()),
            (Setting::PreferredVolume, self.volume.as_ref()),
            (Setting::PreferredQuality, self.quality.as_ref()),
        ]
    }
}

/// What an import replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub playlists: Option<usize>,
    pub statistics: bool,
    pub settings: usize,
}

impl Storage {
    pub fn export_data(&self, now: OffsetDateTime) -> anyhow::Result<ExportData> {
        let settings = ExportSettings {
            theme: self.setting(Setting::Theme)?,
            play_mode: self.setting(Setting::PlayMode)?,
            volume: self.setting(Setting::PreferredVolume)?,
            quality: self.setting(Setting::PreferredQuality)?,
        };
        Ok(ExportData {
            playlists: Some(self.playlists()?),
            play_history: Some(self.history()?),
            play_statistics: Some(self.statistics()?),
            settings: Some(settings),
            export_date: Some(now_rfc3339(now)),
        })
    }

    pub fn export_json(&self, now: OffsetDateTime) -> anyhow::Result<String> {
        let data = self.export_data(now)?;
        serde_json::to_string_pretty(&data).context("serialize export")
    }

    /// Replace playlists, statistics and settings with the ones present in
    /// `raw`. A document that does not parse changes nothing.
    pub fn import_json(&self, raw: &str) -> anyhow::Result<ImportReport> {
        let data: ExportData = serde_json::from_str(raw).context("import file is not valid")?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin import")?;
        let mut report = ImportReport::default();

        if let Some(playlists) = &data.playlists {
            let encoded = serde_json::to_string(playlists).context("encode playlists")?;
            put_value(&tx, KEY_PLAYLISTS, &encoded)?;
            report.playlists = Some(playlists.len());
        }
        if let Some(stats) = &data.play_statistics {
            let encoded = serde_json::to_string(stats).context("encode statistics")?;
            put_value(&tx, KEY_STATISTICS, &encoded)?;
            report.statistics = true;
        }
        if let Some(settings) = &data.settings {
            for (setting, value) in settings.pairs() {
                if let Some(value) = value {
                    put_value(&tx, setting.key(), value)?;
                    report.settings += 1;
                }
            }
        }

        tx.commit().context("commit import")?;
        tracing::info!(
            playlists = ?report.playlists,
            statistics = report.statistics,
            settings = report.settings,
            "imported library"
        );
        Ok(report)
    }

    #[cfg(test)]
    fn raw_value(&self, key: &str) -> anyhow::Result<Option<String>> {
        super::get_value(&self.conn, key)
    }
}

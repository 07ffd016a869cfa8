//! Run configuration, parsed from the command line and environment.

use crate::youtube_api::client::DEFAULT_BASE_URL;
use clap::Parser;
use std::path::PathBuf;

/// Export the videos of every playlist of a YouTube channel to a CSV file.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct ExportConfig {
    /// Name of the channel to export, resolved through YouTube search
    #[arg(env = "YT_EXPORT_CHANNEL")]
    pub channel: String,

    /// OAuth client secret file downloaded from the Google Cloud console
    #[arg(long, env = "YT_EXPORT_CLIENT_SECRET", default_value = "client_secret.json")]
    pub client_secret: PathBuf,

    /// Where the user's OAuth token is cached between runs
    #[arg(long, env = "YT_EXPORT_TOKEN_FILE", default_value = "token.json")]
    pub token_file: PathBuf,

    /// Output CSV file [default: <CHANNEL>_videos.csv]
    #[arg(long, short, env = "YT_EXPORT_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Maximum number of result pages to fetch for any one listing
    #[arg(long, env = "YT_EXPORT_MAX_PAGES", default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: u32,

    /// Base URL of the YouTube Data API
    #[arg(long, env = "YT_EXPORT_API_BASE", default_value = DEFAULT_BASE_URL, hide = true)]
    pub api_base: String,
}

impl ExportConfig {
    /// The file the export is written to.
    ///
    /// Path separators in the channel name are replaced so the default always lands in the
    /// working directory.
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let stem: String = self
                    .channel
                    .chars()
                    .map(|c| if std::path::is_separator(c) { '_' } else { c })
                    .collect();
                PathBuf::from(format!("{stem}_videos.csv"))
            }
        }
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = ExportConfig::try_parse_from(["youtube-playlist-export", "NeetCode"]).unwrap();
        assert_eq!(config.channel, "NeetCode");
        assert_eq!(config.client_secret, PathBuf::from("client_secret.json"));
        assert_eq!(config.token_file, PathBuf::from("token.json"));
        assert_eq!(config.output_path(), PathBuf::from("NeetCode_videos.csv"));
        assert_eq!(config.max_pages(), 1000);
        assert_eq!(config.api_base, DEFAULT_BASE_URL);
    }

    #[test]
    fn explicit_output_wins() {
        let config = ExportConfig::try_parse_from([
            "youtube-playlist-export",
            "NeetCode",
            "--output",
            "out/neet.csv",
            "--max-pages",
            "3",
        ])
        .unwrap();
        assert_eq!(config.output_path(), PathBuf::from("out/neet.csv"));
        assert_eq!(config.max_pages(), 3);
    }

    #[test]
    fn separators_in_channel_name_stay_out_of_the_path() {
        let config = ExportConfig::try_parse_from(["youtube-playlist-export", "AC/DC"]).unwrap();
        assert_eq!(config.output_path(), PathBuf::from("AC_DC_videos.csv"));
    }

    #[test]
    fn zero_pages_is_rejected() {
        let result =
            ExportConfig::try_parse_from(["youtube-playlist-export", "x", "--max-pages", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        ExportConfig::command().debug_assert();
    }
}

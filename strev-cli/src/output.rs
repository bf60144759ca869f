use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use platforms_parser::enrichment::{TitleCandidate, TitleDetails};
use platforms_parser::extractor::ProviderConfig;
use platforms_parser::gateway::FetchResult;
use platforms_parser::media::{Confidence, EpisodeStreams, StreamCandidate};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;
#[cfg(feature = "table-output")]
use tabled::{Table, Tabled, settings::Style};

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_streams(
        &self,
        results: &[EpisodeStreams],
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.pretty_streams(results)),
            OutputFormat::Json => Self::json(&Self::single_or_all(results), true),
            OutputFormat::JsonCompact => Self::json(&Self::single_or_all(results), false),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => Ok(Self::streams_table(results)),
            #[cfg(not(feature = "table-output"))]
            OutputFormat::Table => {
                // Fallback to pretty format when table feature is disabled
                Ok(self.pretty_streams(results))
            }
            OutputFormat::Csv => Ok(Self::streams_csv(results)),
        }
    }

    pub fn format_fetch_results(
        &self,
        results: &[FetchResult],
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Self::json(&results, true),
            OutputFormat::JsonCompact => Self::json(&results, false),
            OutputFormat::Csv => {
                let mut output = String::from("url,status,success,content_type,error\n");
                for result in results {
                    output.push_str(&format!(
                        "\"{}\",{},{},\"{}\",\"{}\"\n",
                        Self::escape_csv(&result.url),
                        result.status,
                        result.success,
                        Self::escape_csv(result.content_type.as_deref().unwrap_or("")),
                        Self::escape_csv(result.error.as_deref().unwrap_or(""))
                    ));
                }
                Ok(output)
            }
            _ => {
                let mut output = String::new();
                for result in results {
                    let status = if result.success {
                        self.colorize(&result.status.to_string(), &Color::Green, true)
                    } else {
                        self.colorize(&result.status.to_string(), &Color::Red, true)
                    };
                    output.push_str(&format!(
                        "{} {}",
                        status,
                        self.colorize(&result.url, &Color::Blue, false)
                    ));
                    if let Some(content_type) = &result.content_type {
                        output.push_str(&format!(" ({content_type})"));
                    }
                    if let Some(body) = &result.body {
                        output.push_str(&format!(" {} bytes", body.len()));
                    }
                    if let Some(error) = &result.error {
                        output.push_str(&format!(" {}", self.colorize(error, &Color::Red, false)));
                    }
                    output.push('\n');
                }
                Ok(output)
            }
        }
    }

    pub fn format_search(
        &self,
        results: &[TitleCandidate],
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Self::json(&results, true),
            OutputFormat::JsonCompact => Self::json(&results, false),
            OutputFormat::Csv => {
                let mut output = String::from("id,title,year,episodes,score,similarity\n");
                for title in results {
                    output.push_str(&format!(
                        "{},\"{}\",{},{},{},{:.3}\n",
                        title.id,
                        Self::escape_csv(&title.title),
                        Self::opt(title.year),
                        Self::opt(title.episodes),
                        Self::opt(title.score),
                        title.similarity
                    ));
                }
                Ok(output)
            }
            _ => {
                let mut output = String::new();
                for title in results {
                    output.push_str(&format!(
                        "{} {}",
                        self.colorize(&format!("[{}]", title.id), &Color::Yellow, false),
                        self.colorize(&title.title, &Color::Cyan, true)
                    ));
                    if let Some(english) = &title.title_english {
                        output.push_str(&format!(" / {english}"));
                    }
                    if let Some(year) = title.year {
                        output.push_str(&format!(" ({year})"));
                    }
                    if let Some(score) = title.score {
                        output.push_str(&format!(" score {score:.2}"));
                    }
                    output.push_str(&format!(" match {:.0}%\n", title.similarity * 100.0));
                }
                Ok(output)
            }
        }
    }

    pub fn format_details(&self, details: &TitleDetails, format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Self::json(details, true),
            OutputFormat::JsonCompact => Self::json(details, false),
            _ => {
                let mut output = String::new();
                output.push_str(&self.colorize(&details.title, &Color::Green, true));
                output.push('\n');
                let mut field = |name: &str, value: Option<String>| {
                    if let Some(value) = value {
                        output.push_str(&format!(
                            "  {}: {}\n",
                            self.colorize(name, &Color::Yellow, false),
                            self.colorize(&value, &Color::Cyan, false)
                        ));
                    }
                };
                field("Id", Some(details.id.to_string()));
                field("English", details.title_english.clone());
                field("Type", details.kind.clone());
                field("Episodes", details.episodes.map(|e| e.to_string()));
                field("Status", details.status.clone());
                field("Year", details.year.map(|y| y.to_string()));
                field("Score", details.score.map(|s| format!("{s:.2}")));
                field(
                    "Genres",
                    (!details.genres.is_empty()).then(|| details.genres.join(", ")),
                );
                field("URL", details.url.clone());
                if let Some(synopsis) = &details.synopsis {
                    output.push('\n');
                    output.push_str(synopsis);
                    output.push('\n');
                }
                Ok(output)
            }
        }
    }

    pub fn format_providers(
        &self,
        providers: &[ProviderConfig],
        detailed: bool,
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Self::json(&providers, true),
            OutputFormat::JsonCompact => Self::json(&providers, false),
            _ => {
                let mut output = String::new();
                output.push_str(&self.colorize("Configured Providers:", &Color::Green, true));
                output.push('\n');
                if providers.is_empty() {
                    output.push_str("  (none, add [[providers]] entries to the configuration)\n");
                }
                for provider in providers {
                    output.push_str(&format!(
                        "  {} - {} [{}]{}\n",
                        self.colorize(&provider.code, &Color::Cyan, true),
                        provider.name,
                        provider.kind,
                        if provider.enabled { "" } else { " (disabled)" }
                    ));
                    if detailed {
                        output.push_str(&format!(
                            "      base: {}\n      episode: {}\n",
                            self.colorize(&provider.base_url, &Color::Blue, false),
                            provider.episode_path
                        ));
                        if let Some(series) = &provider.series_path {
                            output.push_str(&format!("      series: {series}\n"));
                        }
                    }
                }
                Ok(output)
            }
        }
    }

    fn single_or_all(results: &[EpisodeStreams]) -> serde_json::Value {
        match results {
            [single] => serde_json::to_value(single).unwrap_or_default(),
            many => serde_json::to_value(many).unwrap_or_default(),
        }
    }

    fn json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
        let mut result = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        result.push('\n');
        Ok(result)
    }

    fn pretty_streams(&self, results: &[EpisodeStreams]) -> String {
        let mut output = String::new();

        for result in results {
            output.push_str(&self.colorize(
                &format!("Episode {}:", result.episode),
                &Color::Green,
                true,
            ));
            output.push('\n');

            if let Some(message) = &result.message {
                output.push_str(&format!(
                    "  {}\n",
                    self.colorize(message, &Color::Yellow, false)
                ));
            }

            for stream in &result.streams {
                output.push_str(&self.pretty_stream(stream));
            }

            for failure in &result.failures {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    self.colorize("!", &Color::Red, true),
                    failure.provider,
                    self.colorize(&failure.error, &Color::Red, false)
                ));
            }
            output.push('\n');
        }

        output
    }

    fn pretty_stream(&self, stream: &StreamCandidate) -> String {
        let mut flags = Vec::new();
        if stream.is_raw {
            flags.push(Cow::Borrowed("RAW"));
        }
        if let Some(kind) = &stream.proxy_kind {
            flags.push(Cow::Owned(format!("player:{kind}")));
        }
        if stream.confidence == Confidence::Low {
            flags.push(Cow::Borrowed("low confidence"));
        }

        let mut line = format!(
            "  {} {} {} {}",
            self.colorize(&format!("{:>7}", stream.quality.as_str()), &Color::Cyan, true),
            self.colorize(&format!("{:<4}", stream.format.as_str()), &Color::Yellow, false),
            self.colorize(&format!("[{}]", stream.provider), &Color::Yellow, false),
            self.colorize(&stream.url, &Color::Blue, false)
        );
        if !flags.is_empty() {
            line.push_str(&format!(" ({})", flags.join(", ")));
        }
        line.push('\n');
        line
    }

    #[cfg(feature = "table-output")]
    fn streams_table(results: &[EpisodeStreams]) -> String {
        #[derive(Tabled)]
        struct TableRow<'a> {
            episode: String,
            provider: &'a str,
            quality: &'a str,
            format: &'a str,
            raw: bool,
            url: &'a str,
        }

        let rows: Vec<TableRow> = results
            .iter()
            .flat_map(|result| {
                result.streams.iter().map(move |stream| TableRow {
                    episode: result.episode.to_string(),
                    provider: &stream.provider,
                    quality: stream.quality.as_str(),
                    format: stream.format.as_str(),
                    raw: stream.is_raw,
                    url: &stream.url,
                })
            })
            .collect();

        let mut table = Table::new(rows).with(Style::modern()).to_string();
        table.push('\n');
        table
    }

    fn streams_csv(results: &[EpisodeStreams]) -> String {
        let mut output =
            String::from("episode,provider,quality,priority,format,raw,needs_proxy,url\n");
        for result in results {
            for stream in &result.streams {
                output.push_str(&format!(
                    "{},\"{}\",{},{},{},{},{},\"{}\"\n",
                    result.episode,
                    Self::escape_csv(&stream.provider),
                    stream.quality,
                    stream.priority,
                    stream.format,
                    stream.is_raw,
                    stream.needs_proxy,
                    Self::escape_csv(&stream.url)
                ));
            }
        }
        output
    }

    fn opt<T: ToString>(value: Option<T>) -> String {
        value.map(|v| v.to_string()).unwrap_or_default()
    }

    // Helper method to avoid unnecessary allocations when escaping CSV
    fn escape_csv(s: &str) -> Cow<'_, str> {
        if s.contains('"') {
            Cow::Owned(s.replace('"', "\"\""))
        } else {
            Cow::Borrowed(s)
        }
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Red,
}

pub fn write_output(content: &str, output_file: Option<&std::path::Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => {
            print!("{content}");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platforms_parser::media::{EpisodeId, QualityHints};

    fn sample() -> EpisodeStreams {
        EpisodeStreams::new(
            EpisodeId::parse("frieren-episode-5").unwrap(),
            vec![
                StreamCandidate::new(
                    "ap",
                    "https://cdn.example/5-1080p.m3u8",
                    &QualityHints::label("1080p"),
                )
                .with_raw(true),
                StreamCandidate::new(
                    "bp",
                    "https://cdn.example/5.mp4",
                    &QualityHints::label("720p"),
                ),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn test_csv_has_one_row_per_stream() {
        let manager = OutputManager::new(false);
        let csv = manager.format_streams(&[sample()], &OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("frieren-episode-5,\"ap\",1080p,80,hls,true"));
    }

    #[test]
    fn test_single_result_json_is_an_object() {
        let manager = OutputManager::new(false);
        let json = manager
            .format_streams(&[sample()], &OutputFormat::JsonCompact)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["streams"].as_array().unwrap().len(), 2);
        assert_eq!(value["streams"][0]["quality"], "1080p");
    }

    #[test]
    fn test_pretty_marks_raw_streams() {
        let manager = OutputManager::new(false);
        let text = manager.format_streams(&[sample()], &OutputFormat::Pretty).unwrap();
        assert!(text.contains("Episode frieren-episode-5:"));
        assert!(text.contains("(RAW)"));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(OutputManager::escape_csv("a\"b"), "a\"\"b");
        assert!(matches!(OutputManager::escape_csv("plain"), Cow::Borrowed(_)));
    }
}

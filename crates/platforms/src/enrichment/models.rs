use serde::{Deserialize, Serialize};

// Upstream (Jikan v4) shapes

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub data: Vec<AnimeData>,
}

#[derive(Debug, Deserialize)]
pub struct DetailsResponse {
    pub data: AnimeData,
}

#[derive(Debug, Deserialize)]
pub struct AnimeData {
    pub mal_id: u64,
    pub url: Option<String>,
    pub title: String,
    pub title_english: Option<String>,
    #[serde(default)]
    pub titles: Vec<AltTitle>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub episodes: Option<u32>,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub year: Option<u32>,
    pub synopsis: Option<String>,
    pub images: Option<Images>,
    #[serde(default)]
    pub genres: Vec<Named>,
}

#[derive(Debug, Deserialize)]
pub struct AltTitle {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct Images {
    pub jpg: Option<ImageSet>,
}

#[derive(Debug, Deserialize)]
pub struct ImageSet {
    pub image_url: Option<String>,
    pub large_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Named {
    pub name: String,
}

impl AnimeData {
    pub fn image_url(&self) -> Option<String> {
        let jpg = self.images.as_ref()?.jpg.as_ref()?;
        jpg.large_image_url.clone().or_else(|| jpg.image_url.clone())
    }

    pub fn all_titles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str())
            .chain(self.title_english.as_deref())
            .chain(self.titles.iter().map(|t| t.title.as_str()))
    }
}

// Public shapes

/// One search hit, ranked by `similarity` then `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleCandidate {
    pub id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleDetails {
    pub id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<AnimeData> for TitleDetails {
    fn from(data: AnimeData) -> Self {
        let image = data.image_url();
        Self {
            id: data.mal_id,
            title: data.title,
            title_english: data.title_english,
            synopsis: data.synopsis,
            kind: data.kind,
            episodes: data.episodes,
            status: data.status,
            score: data.score,
            year: data.year,
            genres: data.genres.into_iter().map(|g| g.name).collect(),
            image,
            url: data.url,
        }
    }
}

//! Psychologist profile models and DTOs.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{education_counts, parse_education, parse_string_list, Education};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Psychologist {
    pub id: String,
    pub slug: String,
    pub full_name: String,
    pub gender: String,
    /// ISO date (YYYY-MM-DD)
    pub birth_date: Option<String>,
    pub city: String,
    pub work_format: String,
    /// JSON array of paradigm tags
    pub main_paradigm: Option<String>,
    pub certification_level: i64,
    pub short_bio: String,
    pub long_bio: String,
    pub price: i64,
    /// JSON array of upload paths
    pub images: Option<String>,
    /// JSON array of education entries
    pub education: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Psychologist {
    pub fn paradigms(&self) -> Vec<String> {
        parse_string_list(self.main_paradigm.as_deref())
    }

    pub fn image_list(&self) -> Vec<String> {
        parse_string_list(self.images.as_deref())
    }

    pub fn education_list(&self) -> Vec<Education> {
        parse_education(self.education.as_deref())
    }

    pub fn birth_date_parsed(&self) -> Option<NaiveDate> {
        self.birth_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// Catalog list entry with derived fields, as of the given date
    pub fn into_catalog_item(self, today: NaiveDate) -> CatalogItem {
        let paradigms = self.paradigms();
        let images = self.image_list();
        let education = self.education_list();
        let (education_count, courses_count) = education_counts(&education);
        let age = self.birth_date_parsed().map(|birth| age_on(birth, today));

        CatalogItem {
            id: self.id,
            slug: self.slug,
            full_name: self.full_name,
            gender: self.gender,
            city: self.city,
            work_format: self.work_format,
            main_paradigm: paradigms,
            certification_level: self.certification_level,
            short_bio: self.short_bio,
            price: self.price,
            images,
            age,
            education_count,
            courses_count,
            created_at: self.created_at,
        }
    }

    /// Full public profile with derived fields, as of the given date
    pub fn into_profile(self, today: NaiveDate) -> PsychologistProfile {
        let paradigms = self.paradigms();
        let images = self.image_list();
        let education = self.education_list();
        let (education_count, courses_count) = education_counts(&education);
        let age = self.birth_date_parsed().map(|birth| age_on(birth, today));

        PsychologistProfile {
            id: self.id,
            slug: self.slug,
            full_name: self.full_name,
            gender: self.gender,
            city: self.city,
            work_format: self.work_format,
            main_paradigm: paradigms,
            certification_level: self.certification_level,
            short_bio: self.short_bio,
            long_bio: self.long_bio,
            price: self.price,
            images,
            age,
            education,
            education_count,
            courses_count,
        }
    }
}

/// Completed years of age on the given date. Birthday counts on the day
/// itself; Feb 29 birthdays roll over on Mar 1 of non-leap years.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i64 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age as i64
}

/// Catalog list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub slug: String,
    pub full_name: String,
    pub gender: String,
    pub city: String,
    pub work_format: String,
    pub main_paradigm: Vec<String>,
    pub certification_level: i64,
    pub short_bio: String,
    pub price: i64,
    pub images: Vec<String>,
    pub age: Option<i64>,
    /// Diplomas in the education history
    pub education_count: i64,
    /// Non-diploma education entries
    pub courses_count: i64,
    pub created_at: String,
}

/// Full public profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychologistProfile {
    pub id: String,
    pub slug: String,
    pub full_name: String,
    pub gender: String,
    pub city: String,
    pub work_format: String,
    pub main_paradigm: Vec<String>,
    pub certification_level: i64,
    pub short_bio: String,
    pub long_bio: String,
    pub price: i64,
    pub images: Vec<String>,
    pub age: Option<i64>,
    pub education: Vec<Education>,
    pub education_count: i64,
    pub courses_count: i64,
}

/// Request to create a psychologist profile
#[derive(Debug, Deserialize)]
pub struct CreatePsychologistRequest {
    pub full_name: String,
    /// Auto-generated from full_name when not provided
    pub slug: Option<String>,
    #[serde(default)]
    pub gender: String,
    pub birth_date: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub work_format: String,
    #[serde(default)]
    pub main_paradigm: Vec<String>,
    #[serde(default = "default_certification_level")]
    pub certification_level: i64,
    #[serde(default)]
    pub short_bio: String,
    #[serde(default)]
    pub long_bio: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub is_published: bool,
}

fn default_certification_level() -> i64 {
    1
}

/// Request to update a psychologist profile (only provided fields change)
#[derive(Debug, Deserialize)]
pub struct UpdatePsychologistRequest {
    pub full_name: Option<String>,
    pub slug: Option<String>,
    pub gender: Option<String>,
    /// Empty string clears the stored birth date
    pub birth_date: Option<String>,
    pub city: Option<String>,
    pub work_format: Option<String>,
    pub main_paradigm: Option<Vec<String>>,
    pub certification_level: Option<i64>,
    pub short_bio: Option<String>,
    pub long_bio: Option<String>,
    pub price: Option<i64>,
    pub images: Option<Vec<String>>,
    pub education: Option<Vec<Education>>,
    pub is_published: Option<bool>,
}

//! Client-side join of an identity source with a profile source.
//!
//! Used when emails and profile details live in separate tables and the
//! backend cannot join them. The profile side is read fully into memory on
//! first use; identity records then stream through and pick up the fields
//! of their matching profile.

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, info};

use mailsync_core::{ContactRecord, ImportError};

use crate::traits::{collect_records, ContactSource};

pub struct JoinSource {
    identity: Box<dyn ContactSource>,
    profile: Box<dyn ContactSource>,
    identity_key: String,
    profile_key: String,
    profiles: Option<HashMap<String, IndexMap<String, String>>>,
    unmatched: usize,
}

impl JoinSource {
    pub fn new(
        identity: Box<dyn ContactSource>,
        profile: Box<dyn ContactSource>,
        identity_key: impl Into<String>,
        profile_key: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            profile,
            identity_key: identity_key.into(),
            profile_key: profile_key.into(),
            profiles: None,
            unmatched: 0,
        }
    }

    async fn load_profiles(&mut self) -> Result<(), ImportError> {
        let records = collect_records(self.profile.as_mut()).await?;
        let mut profiles = HashMap::with_capacity(records.len());
        for record in records {
            if let Some(key) = record.named.get(&self.profile_key).cloned() {
                profiles.insert(key, record.named);
            }
        }
        info!(
            profiles = profiles.len(),
            source = %self.profile.describe(),
            "loaded profiles for join"
        );
        self.profiles = Some(profiles);
        Ok(())
    }
}

#[async_trait]
impl ContactSource for JoinSource {
    async fn next_record(&mut self) -> Result<Option<ContactRecord>, ImportError> {
        if self.profiles.is_none() {
            self.load_profiles().await?;
        }

        let Some(mut record) = self.identity.next_record().await? else {
            debug!(unmatched = self.unmatched, "join complete");
            return Ok(None);
        };

        let profile = record
            .named
            .get(&self.identity_key)
            .and_then(|key| self.profiles.as_ref().and_then(|p| p.get(key)));

        match profile {
            Some(fields) => {
                // Identity fields win on key collisions.
                for (k, v) in fields {
                    if !record.named.contains_key(k) {
                        record.named.insert(k.clone(), v.clone());
                    }
                }
            }
            None => self.unmatched += 1,
        }
        Ok(Some(record))
    }

    fn skipped_rows(&self) -> usize {
        self.identity.skipped_rows()
    }

    fn describe(&self) -> String {
        format!(
            "{} joined with {} on {}={}",
            self.identity.describe(),
            self.profile.describe(),
            self.identity_key,
            self.profile_key
        )
    }
}

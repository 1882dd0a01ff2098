use {
    serde::{
        Deserialize,
        Serialize,
    },
    std::{
        collections::HashMap,
        fmt::{
            Display,
            Formatter,
        },
        str::FromStr,
    },
    time::OffsetDateTime,
    utoipa::ToSchema,
};

pub type AuctionId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Pending,
    Running,
    Finished,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Pending => "PENDING",
            AuctionStatus::Running => "RUNNING",
            AuctionStatus::Finished => "FINISHED",
        }
    }
}

impl Display for AuctionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AuctionStatus::Pending),
            "RUNNING" => Ok(AuctionStatus::Running),
            "FINISHED" => Ok(AuctionStatus::Finished),
            _ => Err(()),
        }
    }
}

/// The externally visible auction record. While an auction is RUNNING this is
/// built from the KV hash; otherwise it comes from the relational row.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Auction {
    #[schema(example = "auc123")]
    pub id:          AuctionId,
    #[schema(example = "seller123")]
    pub seller_id:   String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, example = "2025-07-27T16:05:05Z")]
    pub starts_at:   OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, example = "2025-07-27T16:05:05Z")]
    pub ends_at:     OffsetDateTime,
    #[schema(example = "RUNNING")]
    pub status:      AuctionStatus,
    pub high_bid:    f64,
    pub high_bidder: String,
}

/// View over the KV hash of a running auction (`auc:<id>`). Missing fields
/// read as empty strings and unparsable numbers as zero; the hash may be
/// partially visible around start and finalization.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveAuction {
    pub seller_id:   String,
    pub starts_at:   i64,
    pub ends_at:     i64,
    pub status:      String,
    pub high_bid:    f64,
    pub high_bidder: String,
}

impl LiveAuction {
    pub fn from_hash(hash: &HashMap<String, String>) -> Self {
        let field = |name: &str| hash.get(name).cloned().unwrap_or_default();
        Self {
            seller_id:   field("sid"),
            starts_at:   epoch_secs(&field("sa")),
            ends_at:     epoch_secs(&field("ea")),
            status:      field("st"),
            high_bid:    amount(&field("hb")),
            high_bidder: field("hbid"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == AuctionStatus::Running.as_str()
    }

    pub fn into_auction(self, id: AuctionId) -> Auction {
        Auction {
            id,
            seller_id: self.seller_id,
            starts_at: from_epoch(self.starts_at),
            ends_at: from_epoch(self.ends_at),
            status: self.status.parse().unwrap_or(AuctionStatus::Running),
            high_bid: self.high_bid,
            high_bidder: self.high_bidder,
        }
    }
}

pub fn epoch_secs(s: &str) -> i64 {
    s.parse().unwrap_or(0)
}

pub fn amount(s: &str) -> f64 {
    s.parse().unwrap_or(0.0)
}

pub fn from_epoch(secs: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(secs).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::collections::HashMap,
    };

    fn hash(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn status_roundtrip() {
        for status in [AuctionStatus::Pending, AuctionStatus::Running, AuctionStatus::Finished] {
            assert_eq!(status.as_str().parse::<AuctionStatus>(), Ok(status));
        }
        assert!("BOGUS".parse::<AuctionStatus>().is_err());
    }

    #[test]
    fn live_auction_from_full_hash() {
        let live = LiveAuction::from_hash(&hash(&[
            ("sid", "s1"),
            ("sa", "1700000000"),
            ("ea", "1700000060"),
            ("st", "RUNNING"),
            ("hb", "5.5"),
            ("hbid", "u1"),
        ]));
        assert_eq!(live.seller_id, "s1");
        assert_eq!(live.starts_at, 1700000000);
        assert_eq!(live.ends_at, 1700000060);
        assert!(live.is_running());
        assert_eq!(live.high_bid, 5.5);
        assert_eq!(live.high_bidder, "u1");
    }

    #[test]
    fn live_auction_tolerates_partial_hash() {
        let live = LiveAuction::from_hash(&hash(&[("st", "RUNNING"), ("hb", "not-a-number")]));
        assert_eq!(live.seller_id, "");
        assert_eq!(live.starts_at, 0);
        assert_eq!(live.high_bid, 0.0);
        assert_eq!(live.high_bidder, "");
        assert!(live.is_running());

        let empty = LiveAuction::from_hash(&HashMap::new());
        assert!(!empty.is_running());
    }

    #[test]
    fn auction_serializes_rfc3339() {
        let auction = LiveAuction::from_hash(&hash(&[
            ("sid", "s1"),
            ("sa", "1753632305"),
            ("ea", "1753632365"),
            ("st", "RUNNING"),
            ("hb", "6"),
            ("hbid", "u2"),
        ]))
        .into_auction("a1".to_string());

        let json = serde_json::to_value(&auction).unwrap();
        assert_eq!(json["id"], "a1");
        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["high_bid"], 6.0);
        assert_eq!(json["starts_at"], "2025-07-27T16:05:05Z");
    }
}

use {
    crate::{
        auction::repository::{
            BidRecord,
            Repository,
        },
        kernel::kv,
        server::SHOULD_EXIT,
    },
    anyhow::{
        anyhow,
        Context,
        Result,
    },
    redis::{
        aio::ConnectionManager,
        streams::{
            StreamId,
            StreamReadOptions,
            StreamReadReply,
        },
        AsyncCommands,
    },
    std::{
        sync::atomic::Ordering,
        time::Duration,
    },
};

const READ_BLOCK_MS: usize = 2_000;
const READ_COUNT: usize = 100;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Tails the append-only bid stream and persists every accepted bid. The
/// last-seen stream id advances only after a successful commit, which gives
/// at-least-once delivery; the conflict-do-nothing insert makes replays
/// idempotent.
pub async fn run_bid_stream_tailer(mut conn: ConnectionManager, repo: Repository) -> Result<()> {
    let mut last_id = String::from("0-0");

    while !SHOULD_EXIT.load(Ordering::Acquire) {
        // The 2 s read block doubles as the shutdown poll cadence.
        let options = StreamReadOptions::default()
            .count(READ_COUNT)
            .block(READ_BLOCK_MS);
        let reply: Option<StreamReadReply> = match conn
            .xread_options(&[kv::BID_STREAM], &[last_id.as_str()], &options)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = ?err, "Bid stream read failed.");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
        };

        let Some(entries) = reply
            .and_then(|r| r.keys.into_iter().next())
            .map(|k| k.ids)
            .filter(|ids| !ids.is_empty())
        else {
            continue;
        };
        let batch_last = entries.last().map(|entry| entry.id.clone()).unwrap_or_default();

        let records: Result<Vec<BidRecord>> = entries.iter().map(parse_record).collect();
        let records = match records {
            Ok(records) => records,
            Err(err) => {
                // a malformed record aborts the whole batch without
                // advancing; the stream is only ever written by the atomic
                // script, so this signals corruption worth keeping visible
                tracing::error!(error = ?err, "Malformed bid stream record; batch aborted.");
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
        };

        if let Err(err) = repo.add_bids(&records).await {
            tracing::error!(error = ?err, "Failed to persist bid batch.");
            tokio::time::sleep(RETRY_BACKOFF).await;
            continue;
        }
        last_id = batch_last;
    }
    Ok(())
}

fn parse_record(entry: &StreamId) -> Result<BidRecord> {
    let field = |name: &str| -> Result<String> {
        let value = entry
            .map
            .get(name)
            .ok_or_else(|| anyhow!("stream entry {} is missing field {name}", entry.id))?;
        redis::from_redis_value(value)
            .with_context(|| format!("stream entry {} field {name} is not a string", entry.id))
    };

    Ok(BidRecord {
        auction_id: field("aid")?,
        bidder_id:  field("bidder")?,
        amount:     field("amount")?
            .parse()
            .with_context(|| format!("stream entry {} has a bad amount", entry.id))?,
        placed_at:  field("at")?
            .parse()
            .with_context(|| format!("stream entry {} has a bad timestamp", entry.id))?,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        redis::Value,
        std::collections::HashMap,
    };

    fn entry(fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id:  "1-0".to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Data(v.as_bytes().to_vec())))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn parses_complete_record() {
        let record = parse_record(&entry(&[
            ("aid", "a1"),
            ("bidder", "u2"),
            ("amount", "6"),
            ("at", "1753632305"),
        ]))
        .unwrap();
        assert_eq!(record, BidRecord {
            auction_id: "a1".to_string(),
            bidder_id:  "u2".to_string(),
            amount:     6.0,
            placed_at:  1753632305,
        });
    }

    #[test]
    fn missing_field_fails() {
        assert!(parse_record(&entry(&[("aid", "a1"), ("bidder", "u2")])).is_err());
    }

    #[test]
    fn bad_amount_fails() {
        let result = parse_record(&entry(&[
            ("aid", "a1"),
            ("bidder", "u2"),
            ("amount", "six"),
            ("at", "0"),
        ]));
        assert!(result.is_err());
    }
}

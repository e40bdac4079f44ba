//! `UTCTiming` scheme resolution: try schemes in document order, skip unrecognised ones, stop
//! at the first that resolves successfully.

use tokio_util::sync::CancellationToken;

use crate::dash::model::UtcTiming;
use crate::fetch::{FetchFacade, RequestType};

/// The server-minus-local clock offset, in milliseconds, resolved from the first `UTCTiming`
/// element whose scheme is recognised and whose fetch (if any) succeeds.
pub async fn resolve_clock_offset_ms(
    elements: &[UtcTiming],
    facade: &FetchFacade,
    cancellation_token: CancellationToken,
) -> Option<i64> {
    for el in elements {
        let offset = match el.scheme_id_uri.as_str() {
            "urn:mpeg:dash:utc:direct:2014" | "urn:mpeg:dash:utc:direct:2012" => {
                resolve_direct(el.value.as_deref())
            }
            "urn:mpeg:dash:utc:http-head:2014" | "urn:mpeg:dash:utc:http-head:2012" => {
                resolve_http_head(el.value.as_deref(), facade, cancellation_token.clone()).await
            }
            "urn:mpeg:dash:utc:http-xsdate:2014" | "urn:mpeg:dash:utc:http-iso:2014" => {
                resolve_http_body_timestamp(el.value.as_deref(), facade, cancellation_token.clone()).await
            }
            _ => None,
        };
        if offset.is_some() {
            return offset;
        }
    }
    None
}

fn resolve_direct(value: Option<&str>) -> Option<i64> {
    let server_ms = parse_iso8601_ms(value?)?;
    Some(server_ms - crate::clock::now_unix_ms())
}

async fn resolve_http_head(value: Option<&str>, facade: &FetchFacade, cancellation_token: CancellationToken) -> Option<i64> {
    let uri = url::Url::parse(value?).ok()?;
    let response = facade.head(RequestType::Timing, uri, cancellation_token).await.ok()?;
    let date_header = response.header("Date")?;
    let server_ms = httpdate_to_ms(date_header)?;
    Some(server_ms - crate::clock::now_unix_ms())
}

async fn resolve_http_body_timestamp(value: Option<&str>, facade: &FetchFacade, cancellation_token: CancellationToken) -> Option<i64> {
    let uri = url::Url::parse(value?).ok()?;
    let response = facade.get(RequestType::Timing, uri, cancellation_token).await.ok()?;
    let body = std::str::from_utf8(&response.body).ok()?;
    let server_ms = parse_iso8601_ms(body.trim())?;
    Some(server_ms - crate::clock::now_unix_ms())
}

pub(crate) fn parse_iso8601_ms(text: &str) -> Option<i64> {
    let parsed = iso8601::datetime(text.trim()).ok()?;
    let naive_date = match parsed.date {
        iso8601::Date::YMD { year, month, day } => chrono::NaiveDate::from_ymd_opt(year, month, day)?,
        iso8601::Date::Ordinal { year, ddd } => chrono::NaiveDate::from_yo_opt(year, ddd)?,
        iso8601::Date::Week { year, ww, d } => {
            chrono::NaiveDate::from_isoywd_opt(year, ww, chrono::Weekday::try_from((d as u8).saturating_sub(1)).ok()?)?
        }
    };
    let time = parsed.time;
    let naive_time = chrono::NaiveTime::from_hms_milli_opt(time.hour, time.minute, time.second, time.millisecond)?;
    Some(naive_date.and_time(naive_time).and_utc().timestamp_millis())
}

/// Parses an RFC 7231 `Date` header (`Sun, 06 Nov 1994 08:49:37 GMT`) to epoch milliseconds.
fn httpdate_to_ms(raw: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(raw).ok().map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_scheme_computes_offset_from_iso8601() {
        let now = crate::clock::now_unix_ms();
        let future = chrono::DateTime::from_timestamp_millis(now + 30_000).unwrap();
        let value = future.to_rfc3339();
        let offset = resolve_direct(Some(&value)).unwrap();
        assert!((offset - 30_000).abs() < 2_000);
    }

    #[test]
    fn httpdate_parses_rfc2822() {
        let ms = httpdate_to_ms("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(ms, 784111777000);
    }
}

//! ASCOM Alpaca device client
//!
//! One [`AlpacaDevice`] talks to one device at
//! `http://host:port/api/v1/{device_type}/{device_number}` and implements the
//! device traits on top of the Alpaca JSON envelope. A non-zero
//! `ErrorNumber` becomes [`DeviceError::Ascom`] so the testers can classify
//! it; transport and parse failures are kept separate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{DeviceConfig, DeviceType};
use crate::device::{
    AlignmentMode, AxisRate, Device, DriveRate, EquatorialSystem, FilterWheelDevice,
    GuideDirection, PierSide, TelescopeAxis, TelescopeDevice,
};
use crate::error::{DeviceError, DeviceResult};
use crate::io::HttpClient;

/// Error fields present in every Alpaca response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AlpacaEnvelope {
    #[serde(default)]
    error_number: i32,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AlpacaValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AlpacaAxisRate {
    minimum: f64,
    maximum: f64,
}

/// Client for a single Alpaca device
pub struct AlpacaDevice {
    base_url: String,
    client_id: u32,
    transaction_id: AtomicU32,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for AlpacaDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlpacaDevice")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl AlpacaDevice {
    pub fn new(config: &DeviceConfig, http: Arc<dyn HttpClient>) -> Self {
        let base_url = format!(
            "http://{}:{}/api/v1/{}/{}",
            config.host,
            config.port,
            config.device_type.alpaca_name(),
            config.device_number
        );
        tracing::debug!(
            "Created Alpaca {} client at {}",
            config.device_type,
            base_url
        );

        Self {
            base_url,
            client_id: config.client_id,
            transaction_id: AtomicU32::new(0),
            http,
        }
    }

    /// Convenience for building a client without a full [`DeviceConfig`]
    pub fn for_device(
        device_type: DeviceType,
        host: &str,
        port: u16,
        device_number: u32,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let config = DeviceConfig {
            device_type,
            host: host.to_string(),
            port,
            device_number,
            ..Default::default()
        };
        Self::new(&config, http)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn next_transaction_id(&self) -> u32 {
        self.transaction_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn get<T: DeserializeOwned>(
        &self,
        member: &str,
        query: &[(&str, String)],
    ) -> DeviceResult<T> {
        let mut url = format!(
            "{}/{}?ClientID={}&ClientTransactionID={}",
            self.base_url,
            member,
            self.client_id,
            self.next_transaction_id()
        );
        for (key, value) in query {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }

        let response = self
            .http
            .get(&url)
            .await
            .map_err(|e| DeviceError::Transport(e.to_string()))?;
        let body = check_status(member, response.status, response.body)?;
        check_envelope(member, &body)?;

        let parsed: AlpacaValue<T> = serde_json::from_str(&body).map_err(|e| {
            DeviceError::InvalidResponse(format!("{}: cannot parse Value: {}", member, e))
        })?;
        Ok(parsed.value)
    }

    async fn put(&self, member: &str, params: &[(&str, String)]) -> DeviceResult<()> {
        let url = format!("{}/{}", self.base_url, member);
        let client_id = self.client_id.to_string();
        let transaction_id = self.next_transaction_id().to_string();

        let mut form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        form.push(("ClientID", &client_id));
        form.push(("ClientTransactionID", &transaction_id));

        let response = self
            .http
            .put_form(&url, &form)
            .await
            .map_err(|e| DeviceError::Transport(e.to_string()))?;
        let body = check_status(member, response.status, response.body)?;
        check_envelope(member, &body)
    }

    /// PUT one parameter to the member of the same name
    async fn put_value(&self, name: &str, value: impl ToString + Send) -> DeviceResult<()> {
        self.put(&name.to_lowercase(), &[(name, value.to_string())])
            .await
    }

    async fn get_enum<E>(&self, member: &str) -> DeviceResult<E>
    where
        E: TryFrom<i32, Error = DeviceError>,
    {
        E::try_from(self.get::<i32>(member, &[]).await?)
    }
}

fn check_status(member: &str, status: u16, body: String) -> DeviceResult<String> {
    if status == 200 {
        Ok(body)
    } else {
        Err(DeviceError::Transport(format!(
            "{} returned HTTP {}: {}",
            member,
            status,
            body.trim()
        )))
    }
}

fn check_envelope(member: &str, body: &str) -> DeviceResult<()> {
    let envelope: AlpacaEnvelope = serde_json::from_str(body)
        .map_err(|e| DeviceError::InvalidResponse(format!("{}: {}", member, e)))?;
    if envelope.error_number != 0 {
        tracing::debug!(
            "{} returned ASCOM error {}: {}",
            member,
            envelope.error_number,
            envelope.error_message
        );
        return Err(DeviceError::ascom(
            envelope.error_number,
            envelope.error_message,
        ));
    }
    Ok(())
}

fn axis_param(axis: TelescopeAxis) -> (&'static str, String) {
    ("Axis", i32::from(axis).to_string())
}

fn equatorial(ra: f64, dec: f64) -> [(&'static str, String); 2] {
    [
        ("RightAscension", ra.to_string()),
        ("Declination", dec.to_string()),
    ]
}

fn horizontal(azimuth: f64, altitude: f64) -> [(&'static str, String); 2] {
    [
        ("Azimuth", azimuth.to_string()),
        ("Altitude", altitude.to_string()),
    ]
}

#[async_trait]
impl Device for AlpacaDevice {
    async fn connected(&self) -> DeviceResult<bool> {
        self.get("connected", &[]).await
    }

    async fn set_connected(&self, connected: bool) -> DeviceResult<()> {
        self.put_value("Connected", connected).await
    }

    async fn description(&self) -> DeviceResult<String> {
        self.get("description", &[]).await
    }

    async fn driver_info(&self) -> DeviceResult<String> {
        self.get("driverinfo", &[]).await
    }

    async fn driver_version(&self) -> DeviceResult<String> {
        self.get("driverversion", &[]).await
    }

    async fn interface_version(&self) -> DeviceResult<i32> {
        self.get("interfaceversion", &[]).await
    }

    async fn name(&self) -> DeviceResult<String> {
        self.get("name", &[]).await
    }

    async fn supported_actions(&self) -> DeviceResult<Vec<String>> {
        self.get("supportedactions", &[]).await
    }
}

#[async_trait]
impl FilterWheelDevice for AlpacaDevice {
    async fn focus_offsets(&self) -> DeviceResult<Vec<i32>> {
        self.get("focusoffsets", &[]).await
    }

    async fn names(&self) -> DeviceResult<Vec<String>> {
        self.get("names", &[]).await
    }

    async fn position(&self) -> DeviceResult<i32> {
        self.get("position", &[]).await
    }

    async fn set_position(&self, position: i32) -> DeviceResult<()> {
        self.put_value("Position", position).await
    }
}

#[async_trait]
impl TelescopeDevice for AlpacaDevice {
    async fn alignment_mode(&self) -> DeviceResult<AlignmentMode> {
        self.get_enum("alignmentmode").await
    }

    async fn altitude(&self) -> DeviceResult<f64> {
        self.get("altitude", &[]).await
    }

    async fn aperture_area(&self) -> DeviceResult<f64> {
        self.get("aperturearea", &[]).await
    }

    async fn aperture_diameter(&self) -> DeviceResult<f64> {
        self.get("aperturediameter", &[]).await
    }

    async fn at_home(&self) -> DeviceResult<bool> {
        self.get("athome", &[]).await
    }

    async fn at_park(&self) -> DeviceResult<bool> {
        self.get("atpark", &[]).await
    }

    async fn azimuth(&self) -> DeviceResult<f64> {
        self.get("azimuth", &[]).await
    }

    async fn can_find_home(&self) -> DeviceResult<bool> {
        self.get("canfindhome", &[]).await
    }

    async fn can_park(&self) -> DeviceResult<bool> {
        self.get("canpark", &[]).await
    }

    async fn can_pulse_guide(&self) -> DeviceResult<bool> {
        self.get("canpulseguide", &[]).await
    }

    async fn can_set_declination_rate(&self) -> DeviceResult<bool> {
        self.get("cansetdeclinationrate", &[]).await
    }

    async fn can_set_guide_rates(&self) -> DeviceResult<bool> {
        self.get("cansetguiderates", &[]).await
    }

    async fn can_set_park(&self) -> DeviceResult<bool> {
        self.get("cansetpark", &[]).await
    }

    async fn can_set_pier_side(&self) -> DeviceResult<bool> {
        self.get("cansetpierside", &[]).await
    }

    async fn can_set_right_ascension_rate(&self) -> DeviceResult<bool> {
        self.get("cansetrightascensionrate", &[]).await
    }

    async fn can_set_tracking(&self) -> DeviceResult<bool> {
        self.get("cansettracking", &[]).await
    }

    async fn can_slew(&self) -> DeviceResult<bool> {
        self.get("canslew", &[]).await
    }

    async fn can_slew_alt_az(&self) -> DeviceResult<bool> {
        self.get("canslewaltaz", &[]).await
    }

    async fn can_slew_alt_az_async(&self) -> DeviceResult<bool> {
        self.get("canslewaltazasync", &[]).await
    }

    async fn can_slew_async(&self) -> DeviceResult<bool> {
        self.get("canslewasync", &[]).await
    }

    async fn can_sync(&self) -> DeviceResult<bool> {
        self.get("cansync", &[]).await
    }

    async fn can_sync_alt_az(&self) -> DeviceResult<bool> {
        self.get("cansyncaltaz", &[]).await
    }

    async fn can_unpark(&self) -> DeviceResult<bool> {
        self.get("canunpark", &[]).await
    }

    async fn can_move_axis(&self, axis: TelescopeAxis) -> DeviceResult<bool> {
        self.get("canmoveaxis", &[axis_param(axis)]).await
    }

    async fn declination(&self) -> DeviceResult<f64> {
        self.get("declination", &[]).await
    }

    async fn declination_rate(&self) -> DeviceResult<f64> {
        self.get("declinationrate", &[]).await
    }

    async fn set_declination_rate(&self, rate: f64) -> DeviceResult<()> {
        self.put_value("DeclinationRate", rate).await
    }

    async fn does_refraction(&self) -> DeviceResult<bool> {
        self.get("doesrefraction", &[]).await
    }

    async fn set_does_refraction(&self, does_refraction: bool) -> DeviceResult<()> {
        self.put_value("DoesRefraction", does_refraction).await
    }

    async fn equatorial_system(&self) -> DeviceResult<EquatorialSystem> {
        self.get_enum("equatorialsystem").await
    }

    async fn focal_length(&self) -> DeviceResult<f64> {
        self.get("focallength", &[]).await
    }

    async fn guide_rate_declination(&self) -> DeviceResult<f64> {
        self.get("guideratedeclination", &[]).await
    }

    async fn set_guide_rate_declination(&self, rate: f64) -> DeviceResult<()> {
        self.put_value("GuideRateDeclination", rate).await
    }

    async fn guide_rate_right_ascension(&self) -> DeviceResult<f64> {
        self.get("guideraterightascension", &[]).await
    }

    async fn set_guide_rate_right_ascension(&self, rate: f64) -> DeviceResult<()> {
        self.put_value("GuideRateRightAscension", rate).await
    }

    async fn is_pulse_guiding(&self) -> DeviceResult<bool> {
        self.get("ispulseguiding", &[]).await
    }

    async fn right_ascension(&self) -> DeviceResult<f64> {
        self.get("rightascension", &[]).await
    }

    async fn right_ascension_rate(&self) -> DeviceResult<f64> {
        self.get("rightascensionrate", &[]).await
    }

    async fn set_right_ascension_rate(&self, rate: f64) -> DeviceResult<()> {
        self.put_value("RightAscensionRate", rate).await
    }

    async fn side_of_pier(&self) -> DeviceResult<PierSide> {
        self.get_enum("sideofpier").await
    }

    async fn set_side_of_pier(&self, side: PierSide) -> DeviceResult<()> {
        self.put_value("SideOfPier", i32::from(side)).await
    }

    async fn sidereal_time(&self) -> DeviceResult<f64> {
        self.get("siderealtime", &[]).await
    }

    async fn site_elevation(&self) -> DeviceResult<f64> {
        self.get("siteelevation", &[]).await
    }

    async fn set_site_elevation(&self, elevation: f64) -> DeviceResult<()> {
        self.put_value("SiteElevation", elevation).await
    }

    async fn site_latitude(&self) -> DeviceResult<f64> {
        self.get("sitelatitude", &[]).await
    }

    async fn set_site_latitude(&self, latitude: f64) -> DeviceResult<()> {
        self.put_value("SiteLatitude", latitude).await
    }

    async fn site_longitude(&self) -> DeviceResult<f64> {
        self.get("sitelongitude", &[]).await
    }

    async fn set_site_longitude(&self, longitude: f64) -> DeviceResult<()> {
        self.put_value("SiteLongitude", longitude).await
    }

    async fn slewing(&self) -> DeviceResult<bool> {
        self.get("slewing", &[]).await
    }

    async fn slew_settle_time(&self) -> DeviceResult<i32> {
        self.get("slewsettletime", &[]).await
    }

    async fn set_slew_settle_time(&self, seconds: i32) -> DeviceResult<()> {
        self.put_value("SlewSettleTime", seconds).await
    }

    async fn target_declination(&self) -> DeviceResult<f64> {
        self.get("targetdeclination", &[]).await
    }

    async fn set_target_declination(&self, declination: f64) -> DeviceResult<()> {
        self.put_value("TargetDeclination", declination).await
    }

    async fn target_right_ascension(&self) -> DeviceResult<f64> {
        self.get("targetrightascension", &[]).await
    }

    async fn set_target_right_ascension(&self, right_ascension: f64) -> DeviceResult<()> {
        self.put_value("TargetRightAscension", right_ascension)
            .await
    }

    async fn tracking(&self) -> DeviceResult<bool> {
        self.get("tracking", &[]).await
    }

    async fn set_tracking(&self, tracking: bool) -> DeviceResult<()> {
        self.put_value("Tracking", tracking).await
    }

    async fn tracking_rate(&self) -> DeviceResult<DriveRate> {
        self.get_enum("trackingrate").await
    }

    async fn set_tracking_rate(&self, rate: DriveRate) -> DeviceResult<()> {
        self.put_value("TrackingRate", i32::from(rate)).await
    }

    async fn tracking_rates(&self) -> DeviceResult<Vec<DriveRate>> {
        let raw: Vec<i32> = self.get("trackingrates", &[]).await?;
        raw.into_iter().map(DriveRate::try_from).collect()
    }

    async fn utc_date(&self) -> DeviceResult<DateTime<Utc>> {
        let raw: String = self.get("utcdate", &[]).await?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|e| DeviceError::InvalidResponse(format!("UTCDate '{}': {}", raw, e)))
    }

    async fn set_utc_date(&self, date: DateTime<Utc>) -> DeviceResult<()> {
        self.put(
            "utcdate",
            &[("UTCDate", date.to_rfc3339_opts(SecondsFormat::Millis, true))],
        )
        .await
    }

    async fn abort_slew(&self) -> DeviceResult<()> {
        self.put("abortslew", &[]).await
    }

    async fn axis_rates(&self, axis: TelescopeAxis) -> DeviceResult<Vec<AxisRate>> {
        let rates: Vec<AlpacaAxisRate> = self.get("axisrates", &[axis_param(axis)]).await?;
        Ok(rates
            .into_iter()
            .map(|rate| AxisRate {
                minimum: rate.minimum,
                maximum: rate.maximum,
            })
            .collect())
    }

    async fn destination_side_of_pier(&self, ra: f64, dec: f64) -> DeviceResult<PierSide> {
        let raw: i32 = self
            .get("destinationsideofpier", &equatorial(ra, dec))
            .await?;
        PierSide::try_from(raw)
    }

    async fn find_home(&self) -> DeviceResult<()> {
        self.put("findhome", &[]).await
    }

    async fn move_axis(&self, axis: TelescopeAxis, rate: f64) -> DeviceResult<()> {
        let params = [axis_param(axis), ("Rate", rate.to_string())];
        self.put("moveaxis", &params).await
    }

    async fn park(&self) -> DeviceResult<()> {
        self.put("park", &[]).await
    }

    async fn pulse_guide(&self, direction: GuideDirection, duration_ms: i32) -> DeviceResult<()> {
        self.put(
            "pulseguide",
            &[
                ("Direction", i32::from(direction).to_string()),
                ("Duration", duration_ms.to_string()),
            ],
        )
        .await
    }

    async fn set_park(&self) -> DeviceResult<()> {
        self.put("setpark", &[]).await
    }

    async fn slew_to_alt_az(&self, azimuth: f64, altitude: f64) -> DeviceResult<()> {
        self.put("slewtoaltaz", &horizontal(azimuth, altitude))
            .await
    }

    async fn slew_to_alt_az_async(&self, azimuth: f64, altitude: f64) -> DeviceResult<()> {
        self.put("slewtoaltazasync", &horizontal(azimuth, altitude))
            .await
    }

    async fn slew_to_coordinates(&self, ra: f64, dec: f64) -> DeviceResult<()> {
        self.put("slewtocoordinates", &equatorial(ra, dec)).await
    }

    async fn slew_to_coordinates_async(&self, ra: f64, dec: f64) -> DeviceResult<()> {
        self.put("slewtocoordinatesasync", &equatorial(ra, dec))
            .await
    }

    async fn slew_to_target(&self) -> DeviceResult<()> {
        self.put("slewtotarget", &[]).await
    }

    async fn slew_to_target_async(&self) -> DeviceResult<()> {
        self.put("slewtotargetasync", &[]).await
    }

    async fn sync_to_alt_az(&self, azimuth: f64, altitude: f64) -> DeviceResult<()> {
        self.put("synctoaltaz", &horizontal(azimuth, altitude))
            .await
    }

    async fn sync_to_coordinates(&self, ra: f64, dec: f64) -> DeviceResult<()> {
        self.put("synctocoordinates", &equatorial(ra, dec)).await
    }

    async fn sync_to_target(&self) -> DeviceResult<()> {
        self.put("synctotarget", &[]).await
    }

    async fn unpark(&self) -> DeviceResult<()> {
        self.put("unpark", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{HttpResponse, MockHttpClient};

    fn response(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    fn telescope(mock: MockHttpClient) -> AlpacaDevice {
        AlpacaDevice::for_device(DeviceType::Telescope, "localhost", 11111, 0, Arc::new(mock))
    }

    #[test]
    fn base_url_uses_device_type_and_number() {
        let device = AlpacaDevice::for_device(
            DeviceType::FilterWheel,
            "192.168.1.5",
            32323,
            2,
            Arc::new(MockHttpClient::new()),
        );
        assert_eq!(
            device.base_url(),
            "http://192.168.1.5:32323/api/v1/filterwheel/2"
        );
    }

    #[tokio::test]
    async fn get_parses_value() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| {
                url.starts_with("http://localhost:11111/api/v1/telescope/0/declination?")
                    && url.contains("ClientID=1")
                    && url.contains("ClientTransactionID=1")
            })
            .returning(|_| {
                Box::pin(async {
                    Ok(response(
                        r#"{"Value": 45.5, "ErrorNumber": 0, "ErrorMessage": ""}"#,
                    ))
                })
            });

        let device = telescope(mock);
        assert_eq!(device.declination().await.unwrap(), 45.5);
    }

    #[tokio::test]
    async fn transaction_ids_increase() {
        let mut mock = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_get()
            .withf(|url| url.contains("ClientTransactionID=1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Box::pin(async { Ok(response(r#"{"Value": true, "ErrorNumber": 0}"#)) })
            });
        mock.expect_get()
            .withf(|url| url.contains("ClientTransactionID=2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Box::pin(async { Ok(response(r#"{"Value": false, "ErrorNumber": 0}"#)) })
            });

        let device = telescope(mock);
        assert!(device.tracking().await.unwrap());
        assert!(!device.tracking().await.unwrap());
    }

    #[tokio::test]
    async fn error_number_becomes_ascom_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(response(
                    r#"{"Value": 0.0, "ErrorNumber": 1026, "ErrorMessage": "Target not set"}"#,
                ))
            })
        });

        let device = telescope(mock);
        let err = device.target_declination().await.unwrap_err();
        assert_eq!(err, DeviceError::ascom(0x402, "Target not set"));
    }

    #[tokio::test]
    async fn error_without_value_field_is_still_ascom_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(response(
                    r#"{"ErrorNumber": 1024, "ErrorMessage": "Not implemented"}"#,
                ))
            })
        });

        let device = telescope(mock);
        assert_eq!(device.altitude().await.unwrap_err().code(), Some(0x400));
    }

    #[tokio::test]
    async fn non_200_is_transport_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_put_form().returning(|_, _| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 400,
                    body: "Bad parameter".to_string(),
                })
            })
        });

        let device = telescope(mock);
        let err = device.set_tracking(true).await.unwrap_err();
        assert!(matches!(err, DeviceError::Transport(ref msg) if msg.contains("HTTP 400")));
    }

    #[tokio::test]
    async fn http_failure_is_transport_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async { Err(crate::ConformError::Http("connection refused".to_string())) })
        });

        let device = telescope(mock);
        assert!(matches!(
            device.connected().await.unwrap_err(),
            DeviceError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn put_sends_parameters_and_client_ids() {
        let mut mock = MockHttpClient::new();
        mock.expect_put_form()
            .withf(|url, params| {
                url.ends_with("/api/v1/telescope/0/slewtocoordinatesasync")
                    && params.contains(&("RightAscension", "12.5"))
                    && params.contains(&("Declination", "-30"))
                    && params.contains(&("ClientID", "1"))
                    && params.iter().any(|(k, _)| *k == "ClientTransactionID")
            })
            .returning(|_, _| {
                Box::pin(async { Ok(response(r#"{"ErrorNumber": 0, "ErrorMessage": ""}"#)) })
            });

        let device = telescope(mock);
        device.slew_to_coordinates_async(12.5, -30.0).await.unwrap();
    }

    #[tokio::test]
    async fn enums_are_decoded() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url.contains("/sideofpier?"))
            .returning(|_| Box::pin(async { Ok(response(r#"{"Value": 1, "ErrorNumber": 0}"#)) }));
        mock.expect_get()
            .withf(|url| url.contains("/trackingrates?"))
            .returning(|_| {
                Box::pin(async { Ok(response(r#"{"Value": [0, 1, 2], "ErrorNumber": 0}"#)) })
            });
        mock.expect_get()
            .withf(|url| url.contains("/alignmentmode?"))
            .returning(|_| Box::pin(async { Ok(response(r#"{"Value": 9, "ErrorNumber": 0}"#)) }));

        let device = telescope(mock);
        assert_eq!(device.side_of_pier().await.unwrap(), PierSide::West);
        assert_eq!(
            device.tracking_rates().await.unwrap(),
            vec![DriveRate::Sidereal, DriveRate::Lunar, DriveRate::Solar]
        );
        assert!(matches!(
            device.alignment_mode().await.unwrap_err(),
            DeviceError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn axis_rates_and_axis_parameter() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url.contains("/axisrates?") && url.ends_with("&Axis=1"))
            .returning(|_| {
                Box::pin(async {
                    Ok(response(
                        r#"{"Value": [{"Minimum": 0.0, "Maximum": 4.0}], "ErrorNumber": 0}"#,
                    ))
                })
            });

        let device = telescope(mock);
        let rates = device.axis_rates(TelescopeAxis::Secondary).await.unwrap();
        assert_eq!(
            rates,
            vec![AxisRate {
                minimum: 0.0,
                maximum: 4.0
            }]
        );
    }

    #[tokio::test]
    async fn utc_date_round_trips_iso_8601() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(response(
                    r#"{"Value": "2024-03-01T22:15:30.250Z", "ErrorNumber": 0}"#,
                ))
            })
        });
        mock.expect_put_form()
            .withf(|_, params| params.contains(&("UTCDate", "2024-03-01T22:15:30.250Z")))
            .returning(|_, _| Box::pin(async { Ok(response(r#"{"ErrorNumber": 0}"#)) }));

        let device = telescope(mock);
        let date = device.utc_date().await.unwrap();
        device.set_utc_date(date).await.unwrap();
    }

    #[tokio::test]
    async fn filter_wheel_names() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url.starts_with("http://localhost:11111/api/v1/filterwheel/0/names?"))
            .returning(|_| {
                Box::pin(async { Ok(response(r#"{"Value": ["Red", "Green"], "ErrorNumber": 0}"#)) })
            });

        let device = AlpacaDevice::for_device(
            DeviceType::FilterWheel,
            "localhost",
            11111,
            0,
            Arc::new(mock),
        );
        assert_eq!(device.names().await.unwrap(), vec!["Red", "Green"]);
    }
}

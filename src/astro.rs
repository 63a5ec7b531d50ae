//! The astronomical collaborator: a narrow, pure-function interface the
//! executor delegates sun-position queries to (§6.2). The kernel itself —
//! correctness of the solar-position mathematics — is deliberately out of
//! scope for this crate's own validation; `NoaaSunCalculator` is a real,
//! runnable default so the rest of the pipeline has something concrete to
//! evaluate against, grounded on the Julian-day and solar-longitude series
//! used for calendar-astronomy in this retrieval pack.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy)]
pub struct SunTimes {
    pub sunrise: DateTime<Tz>,
    pub sunset: DateTime<Tz>,
    pub solar_noon: DateTime<Tz>,
    pub day_length_minutes: f64,
}

/// Depression angle, in degrees below the horizon, at which visible
/// sunrise/sunset are defined (refraction + the sun's angular radius).
pub const VISIBLE_DEPRESSION_DEGREES: f64 = 0.833;

pub trait SunCalculator {
    fn sun_times(&self, date: NaiveDate, lat: f64, lon: f64, elevation_m: f64, tz: Tz) -> SunTimes;

    fn sun_time_at_angle(
        &self,
        date: NaiveDate,
        lat: f64,
        lon: f64,
        tz: Tz,
        degrees: f64,
    ) -> (DateTime<Tz>, DateTime<Tz>);

    fn sun_time_at_angle_with_elevation(
        &self,
        date: NaiveDate,
        lat: f64,
        lon: f64,
        elevation_m: f64,
        tz: Tz,
        degrees: f64,
    ) -> (DateTime<Tz>, DateTime<Tz>);

    fn seasonal_sun_time_at_angle(
        &self,
        date: NaiveDate,
        lat: f64,
        lon: f64,
        tz: Tz,
        degrees: f64,
    ) -> (DateTime<Tz>, DateTime<Tz>);
}

pub struct NoaaSunCalculator;

impl SunCalculator for NoaaSunCalculator {
    fn sun_times(&self, date: NaiveDate, lat: f64, lon: f64, elevation_m: f64, tz: Tz) -> SunTimes {
        let dip = elevation_dip_degrees(elevation_m);
        let (sunrise, sunset) =
            sun_times_at_depression(date, lat, lon, tz, VISIBLE_DEPRESSION_DEGREES + dip);
        let solar_noon = solar_noon_at(date, lon, tz);
        let day_length_minutes = if is_zero(sunrise) || is_zero(sunset) {
            0.0
        } else {
            (sunset - sunrise).num_seconds() as f64 / 60.0
        };
        SunTimes { sunrise, sunset, solar_noon, day_length_minutes }
    }

    fn sun_time_at_angle(
        &self,
        date: NaiveDate,
        lat: f64,
        lon: f64,
        tz: Tz,
        degrees: f64,
    ) -> (DateTime<Tz>, DateTime<Tz>) {
        if !(0.0..=90.0).contains(&degrees) {
            return (zero_instant(tz), zero_instant(tz));
        }
        sun_times_at_depression(date, lat, lon, tz, degrees)
    }

    fn sun_time_at_angle_with_elevation(
        &self,
        date: NaiveDate,
        lat: f64,
        lon: f64,
        elevation_m: f64,
        tz: Tz,
        degrees: f64,
    ) -> (DateTime<Tz>, DateTime<Tz>) {
        if !(0.0..=90.0).contains(&degrees) {
            return (zero_instant(tz), zero_instant(tz));
        }
        let dip = elevation_dip_degrees(elevation_m);
        sun_times_at_depression(date, lat, lon, tz, degrees + dip)
    }

    fn seasonal_sun_time_at_angle(
        &self,
        date: NaiveDate,
        lat: f64,
        lon: f64,
        tz: Tz,
        degrees: f64,
    ) -> (DateTime<Tz>, DateTime<Tz>) {
        if !(0.0..=90.0).contains(&degrees) {
            return (zero_instant(tz), zero_instant(tz));
        }
        let (dawn, dusk) = sun_times_at_depression(date, lat, lon, tz, degrees);
        let (geo_sunrise, geo_sunset) = sun_times_at_depression(date, lat, lon, tz, 0.0);
        if is_zero(dawn) || is_zero(dusk) || is_zero(geo_sunrise) || is_zero(geo_sunset) {
            return (dawn, dusk);
        }
        let day_length_minutes = (geo_sunset - geo_sunrise).num_seconds() as f64 / 60.0;
        let ratio = day_length_minutes / (12.0 * 60.0);
        let dawn_offset_minutes = (geo_sunrise - dawn).num_seconds() as f64 / 60.0;
        let dusk_offset_minutes = (dusk - geo_sunset).num_seconds() as f64 / 60.0;
        let scaled_dawn = geo_sunrise - chrono::Duration::milliseconds((dawn_offset_minutes * ratio * 60_000.0) as i64);
        let scaled_dusk = geo_sunset + chrono::Duration::milliseconds((dusk_offset_minutes * ratio * 60_000.0) as i64);
        (scaled_dawn, scaled_dusk)
    }
}

fn zero_instant(tz: Tz) -> DateTime<Tz> {
    DateTime::<Utc>::from_timestamp(0, 0).unwrap().with_timezone(&tz)
}

fn is_zero(dt: DateTime<Tz>) -> bool {
    dt.timestamp() == 0
}

fn elevation_dip_degrees(elevation_m: f64) -> f64 {
    if elevation_m <= 0.0 {
        0.0
    } else {
        0.0347 * elevation_m.sqrt()
    }
}

fn jd_from_datetime(dt: DateTime<Utc>) -> f64 {
    let seconds = dt.timestamp() as f64 + (dt.timestamp_subsec_nanos() as f64) / 1e9;
    seconds / 86400.0 + 2440587.5
}

fn datetime_from_jd(jd: f64) -> DateTime<Utc> {
    let seconds = (jd - 2440587.5) * 86400.0;
    let mut whole = seconds.floor() as i64;
    let mut nanos = ((seconds - whole as f64) * 1e9).round() as i64;
    if nanos >= 1_000_000_000 {
        whole += 1;
        nanos -= 1_000_000_000;
    } else if nanos < 0 {
        whole -= 1;
        nanos += 1_000_000_000;
    }
    DateTime::<Utc>::from_timestamp(whole, nanos as u32).unwrap()
}

fn jd_at_utc_midnight(date: NaiveDate) -> f64 {
    let naive = NaiveDateTime::new(date, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    jd_from_datetime(Utc.from_utc_datetime(&naive))
}

/// Solar apparent longitude in degrees at Julian day `jd`. NOAA/Meeus
/// low-precision series.
fn sun_apparent_longitude(jd: f64) -> f64 {
    let t = (jd - 2451545.0) / 36525.0;
    let l0 = 280.46646 + 36000.76983 * t + 0.0003032 * t * t;
    let m = 357.52911 + 35999.05029 * t - 0.0001537 * t * t;
    let m_rad = m.to_radians();
    let c = (1.914602 - 0.004817 * t - 0.000014 * t * t) * m_rad.sin()
        + (0.019993 - 0.000101 * t) * (2.0 * m_rad).sin()
        + 0.000289 * (3.0 * m_rad).sin();
    let true_long = l0 + c;
    let omega = 125.04 - 1934.136 * t;
    let lambda = true_long - 0.00569 - 0.00478 * omega.to_radians().sin();
    norm_deg(lambda)
}

fn mean_obliquity(t: f64) -> f64 {
    23.439291 - 0.0130042 * t - 1.64e-7 * t * t + 5.04e-7 * t * t * t
}

fn solar_declination(jd: f64) -> f64 {
    let t = (jd - 2451545.0) / 36525.0;
    let lambda = sun_apparent_longitude(jd).to_radians();
    let epsilon = mean_obliquity(t).to_radians();
    (epsilon.sin() * lambda.sin()).asin()
}

/// Equation of time in minutes, using the standard low-precision series.
fn equation_of_time(jd: f64) -> f64 {
    let t = (jd - 2451545.0) / 36525.0;
    let l0 = 280.46646 + 36000.76983 * t + 0.0003032 * t * t;
    let m = 357.52911 + 35999.05029 * t - 0.0001537 * t * t;
    let e = 0.016708634 - 0.000042037 * t - 0.0000001267 * t * t;
    let epsilon = mean_obliquity(t).to_radians();
    let y = (epsilon / 2.0).tan().powi(2);

    let l0_rad = l0.to_radians();
    let m_rad = m.to_radians();

    let eq_time = y * (2.0 * l0_rad).sin() - 2.0 * e * m_rad.sin()
        + 4.0 * e * y * m_rad.sin() * (2.0 * l0_rad).cos()
        - 0.5 * y * y * (4.0 * l0_rad).sin()
        - 1.25 * e * e * (2.0 * m_rad).sin();

    eq_time.to_degrees() * 4.0
}

fn norm_deg(mut deg: f64) -> f64 {
    deg %= 360.0;
    if deg < 0.0 {
        deg += 360.0;
    }
    deg
}

fn solar_noon_at(date: NaiveDate, lon: f64, tz: Tz) -> DateTime<Tz> {
    let jd_midnight = jd_at_utc_midnight(date);
    let eq_time = equation_of_time(jd_midnight + 0.5);
    let noon_minutes_utc = 720.0 - 4.0 * lon - eq_time;
    let noon_jd = jd_midnight + noon_minutes_utc / 1440.0;
    datetime_from_jd(noon_jd).with_timezone(&tz)
}

/// Computes the pair of instants when the sun's centre is `degrees` below
/// the horizon on `date`, or a pair of zero-instants when no such crossing
/// exists at that latitude/season (polar day or polar night).
fn sun_times_at_depression(
    date: NaiveDate,
    lat: f64,
    lon: f64,
    tz: Tz,
    degrees: f64,
) -> (DateTime<Tz>, DateTime<Tz>) {
    let jd_midnight = jd_at_utc_midnight(date);
    let jd_noon = jd_midnight + 0.5;
    let decl = solar_declination(jd_noon);
    let eq_time = equation_of_time(jd_noon);

    let lat_rad = lat.to_radians();
    let zenith_rad = (90.0 + degrees).to_radians();

    let cos_ha = (zenith_rad.cos() - lat_rad.sin() * decl.sin()) / (lat_rad.cos() * decl.cos());
    if !(-1.0..=1.0).contains(&cos_ha) {
        return (zero_instant(tz), zero_instant(tz));
    }

    let ha_degrees = cos_ha.acos().to_degrees();
    let noon_minutes_utc = 720.0 - 4.0 * lon - eq_time;
    let rise_minutes_utc = noon_minutes_utc - 4.0 * ha_degrees;
    let set_minutes_utc = noon_minutes_utc + 4.0 * ha_degrees;

    let rise_jd = jd_midnight + rise_minutes_utc / 1440.0;
    let set_jd = jd_midnight + set_minutes_utc / 1440.0;

    (datetime_from_jd(rise_jd).with_timezone(&tz), datetime_from_jd(set_jd).with_timezone(&tz))
}

use das2stream_schema::{CodecError, PacketId, PacketSchema, PlaneKind, TimeParser, Units};
use serde::Serialize;

/// Decoded values of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plane {
    pub kind: PlaneKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub units: Units,
    /// One value, or `nitems` values for a `yscan`.
    pub values: Vec<f64>,
}

/// One decoded `:NN:` packet.
///
/// `planes` holds every field in packet order, the x plane included; `x`
/// and `x_units` repeat the x plane for convenience.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRecord {
    pub packet_id: PacketId,
    pub x: f64,
    pub x_units: Units,
    pub planes: Vec<Plane>,
}

/// A field that failed to decode.
#[derive(Debug)]
pub(crate) struct FieldFailure {
    pub index: usize,
    pub error: CodecError,
}

impl DataRecord {
    /// Decode a packet body of exactly `schema.byte_len()` bytes.
    pub(crate) fn decode(
        packet_id: PacketId,
        schema: &PacketSchema,
        body: &[u8],
        time: &dyn TimeParser,
    ) -> Result<Self, FieldFailure> {
        let mut planes = Vec::with_capacity(schema.fields().len());
        let mut x = f64::NAN;
        let mut x_units = Units::dimensionless();
        let mut offset = 0;

        for (index, field) in schema.fields().iter().enumerate() {
            let size = field.codec.size_bytes();
            let mut values = Vec::with_capacity(field.item_count());
            for _ in 0..field.item_count() {
                let value = field
                    .codec
                    .decode(&body[offset..offset + size], time)
                    .map_err(|error| FieldFailure { index, error })?;
                values.push(value);
                offset += size;
            }
            if field.kind() == PlaneKind::X {
                x = values.first().copied().unwrap_or(f64::NAN);
                x_units = field.units.clone();
            }
            planes.push(Plane {
                kind: field.kind(),
                name: field.name.clone(),
                units: field.units.clone(),
                values,
            });
        }

        Ok(Self {
            packet_id,
            x,
            x_units,
            planes,
        })
    }

    /// First plane called `name`.
    pub fn plane(&self, name: &str) -> Option<&Plane> {
        self.planes
            .iter()
            .find(|plane| plane.name.as_deref() == Some(name))
    }

    /// Planes of one kind, in packet order.
    pub fn planes_of(&self, kind: PlaneKind) -> impl Iterator<Item = &Plane> {
        self.planes.iter().filter(move |plane| plane.kind == kind)
    }

    /// Every value in packet order, as [`StreamWriter::write_packet`]
    /// expects them.
    ///
    /// [`StreamWriter::write_packet`]: crate::StreamWriter::write_packet
    pub fn values(&self) -> Vec<f64> {
        self.planes
            .iter()
            .flat_map(|plane| plane.values.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use das2stream_schema::{ByteOrder, Codec, FieldSpec, IsoTimeParser, YTags};

    use super::*;

    fn schema() -> PacketSchema {
        PacketSchema::new(vec![
            FieldSpec::y(Codec::Ascii { width: 6 }, "V").with_name("amp"),
            FieldSpec::x(
                Codec::Real8 {
                    order: ByteOrder::Little,
                },
                "t2000",
            ),
            FieldSpec::yscan(
                Codec::Real4 {
                    order: ByteOrder::Big,
                },
                "dB",
                2,
                YTags::default(),
                "Hz",
            )
            .with_name("spec"),
        ])
        .unwrap()
    }

    #[test]
    fn decodes_in_field_order() {
        let mut body = Vec::new();
        body.extend_from_slice(b" 2.5 \n");
        body.extend_from_slice(&10.0f64.to_le_bytes());
        body.extend_from_slice(&1.0f32.to_be_bytes());
        body.extend_from_slice(&(-3.0f32).to_be_bytes());

        let id = PacketId::new(4).unwrap();
        let record = DataRecord::decode(id, &schema(), &body, &IsoTimeParser).unwrap();
        assert_eq!(record.x, 10.0);
        assert_eq!(record.x_units.as_str(), "t2000");
        assert_eq!(record.plane("amp").unwrap().values, vec![2.5]);
        assert_eq!(record.plane("spec").unwrap().values, vec![1.0, -3.0]);
        assert_eq!(record.planes_of(PlaneKind::YScan).count(), 1);
        assert_eq!(record.values(), vec![2.5, 10.0, 1.0, -3.0]);
    }

    #[test]
    fn reports_the_failing_field() {
        let mut body = Vec::new();
        body.extend_from_slice(b" abc  ");
        body.extend_from_slice(&[0; 16]);

        let id = PacketId::new(4).unwrap();
        let failure = DataRecord::decode(id, &schema(), &body, &IsoTimeParser).unwrap_err();
        assert_eq!(failure.index, 0);
        assert!(matches!(failure.error, CodecError::Decode { .. }));
    }
}

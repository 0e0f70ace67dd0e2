//! ECHONET Lite wire protocol implementation.
//! Handles Format 1 frame packing and bounds-checked parsing.

use crate::error::{Result, V2hError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

pub const EHD1_ECHONET_LITE: u8 = 0x10;
pub const EHD2_FORMAT1: u8 = 0x81;
pub const EHD2_FORMAT2: u8 = 0x82;

/// Standard ECHONET Lite UDP port.
pub const ECHONET_PORT: u16 = 3610;
/// ECHONET Lite IPv4 multicast group.
pub const MULTICAST_ADDR: std::net::Ipv4Addr = std::net::Ipv4Addr::new(224, 0, 23, 0);

/// Header (EHD1, EHD2, TID) + SEOJ + DEOJ + ESV + OPC
const FORMAT1_HEADER_LEN: usize = 12;

define_service_codes! {
    SetISna = ("SETI_SNA", 0x50),
    SetCSna = ("SETC_SNA", 0x51),
    GetSna = ("GET_SNA", 0x52),
    InfSna = ("INF_SNA", 0x53),
    SetGetSna = ("SETGET_SNA", 0x5E),
    SetI = ("SETI", 0x60),
    SetC = ("SETC", 0x61),
    Get = ("GET", 0x62),
    InfReq = ("INF_REQ", 0x63),
    SetGet = ("SETGET", 0x6E),
    SetRes = ("SET_RES", 0x71),
    GetRes = ("GET_RES", 0x72),
    Inf = ("INF", 0x73),
    InfC = ("INFC", 0x74),
    InfCRes = ("INFC_RES", 0x7A),
    SetGetRes = ("SETGET_RES", 0x7E),
}

/// ECHONET object code: class group, class and instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Eoj {
    pub class_group: u8,
    pub class: u8,
    pub instance: u8,
}

/// Node profile object; the controller speaks as this object.
pub const CONTROLLER_EOJ: Eoj = Eoj::new(0x0e, 0xf0, 0x01);
/// Electric vehicle charger/discharger (V2H) instance 1.
pub const V2H_EOJ: Eoj = Eoj::new(0x02, 0x7e, 0x01);

impl Eoj {
    pub const fn new(class_group: u8, class: u8, instance: u8) -> Self {
        Self {
            class_group,
            class,
            instance,
        }
    }

    pub fn as_bytes(&self) -> [u8; 3] {
        [self.class_group, self.class, self.instance]
    }
}

impl fmt::Display for Eoj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{:02x}{:02x}",
            self.class_group, self.class, self.instance
        )
    }
}

impl FromStr for Eoj {
    type Err = V2hError;

    /// Parses exactly six hex digits, e.g. `027e01`.
    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 6 {
            return Err(V2hError::usage(format!(
                "object code must be 6 hex digits, got '{}'",
                s
            )));
        }
        let bytes = hex::decode(s)
            .map_err(|e| V2hError::usage(format!("invalid object code '{}': {}", s, e)))?;
        Ok(Eoj::new(bytes[0], bytes[1], bytes[2]))
    }
}

/// One property operation: EPC plus its data (PDC is the data length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub epc: u8,
    pub edt: Vec<u8>,
}

impl Property {
    pub fn new(epc: u8, edt: impl Into<Vec<u8>>) -> Self {
        Self {
            epc,
            edt: edt.into(),
        }
    }

    /// A property with no data, as used by GET requests.
    pub fn request(epc: u8) -> Self {
        Self::new(epc, Vec::new())
    }
}

/// ECHONET Lite Format 1 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Transaction ID
    pub tid: u16,
    /// Source object
    pub seoj: Eoj,
    /// Destination object
    pub deoj: Eoj,
    /// Raw service code; inbound frames may carry codes outside the table
    pub esv: u8,
    /// Property operations, `props.len()` is the OPC
    pub props: Vec<Property>,
}

impl Frame {
    pub fn service(&self) -> Option<ServiceCode> {
        ServiceCode::from_u8(self.esv)
    }
}

/// Pack a Format 1 frame into binary data.
pub fn pack_frame(frame: &Frame) -> Result<Vec<u8>> {
    let opc = u8::try_from(frame.props.len())
        .map_err(|_| V2hError::Decode(format!("too many properties: {}", frame.props.len())))?;

    let mut data = Vec::with_capacity(FORMAT1_HEADER_LEN + frame.props.len() * 3);
    data.write_u8(EHD1_ECHONET_LITE)?;
    data.write_u8(EHD2_FORMAT1)?;
    data.write_u16::<BigEndian>(frame.tid)?;
    data.extend_from_slice(&frame.seoj.as_bytes());
    data.extend_from_slice(&frame.deoj.as_bytes());
    data.write_u8(frame.esv)?;
    data.write_u8(opc)?;

    for prop in &frame.props {
        let pdc = u8::try_from(prop.edt.len()).map_err(|_| {
            V2hError::Decode(format!(
                "property 0x{:02X} data too long: {} bytes",
                prop.epc,
                prop.edt.len()
            ))
        })?;
        data.write_u8(prop.epc)?;
        data.write_u8(pdc)?;
        data.extend_from_slice(&prop.edt);
    }

    Ok(data)
}

/// Parse binary data into a Format 1 frame.
pub fn parse_frame(data: &[u8]) -> Result<Frame> {
    if data.len() < FORMAT1_HEADER_LEN {
        return Err(V2hError::Decode(format!(
            "frame too short: {} bytes",
            data.len()
        )));
    }

    let mut cursor = Cursor::new(data);
    let ehd1 = cursor.read_u8()?;
    if ehd1 != EHD1_ECHONET_LITE {
        return Err(V2hError::Decode(format!("not ECHONET Lite: EHD1=0x{:02X}", ehd1)));
    }
    match cursor.read_u8()? {
        EHD2_FORMAT1 => {}
        EHD2_FORMAT2 => return Err(V2hError::Decode("Format 2 frames are not supported".into())),
        other => return Err(V2hError::Decode(format!("unknown EHD2=0x{:02X}", other))),
    }

    let tid = cursor.read_u16::<BigEndian>()?;
    let seoj = read_eoj(&mut cursor)?;
    let deoj = read_eoj(&mut cursor)?;
    let esv = cursor.read_u8()?;
    let opc = cursor.read_u8()?;

    let mut props = Vec::with_capacity(opc as usize);
    for i in 0..opc {
        let (epc, pdc) = match (cursor.read_u8(), cursor.read_u8()) {
            (Ok(epc), Ok(pdc)) => (epc, pdc),
            _ => {
                return Err(V2hError::Decode(format!(
                    "truncated at property {} of {}",
                    i + 1,
                    opc
                )));
            }
        };
        let mut edt = vec![0u8; pdc as usize];
        cursor.read_exact(&mut edt).map_err(|_| {
            V2hError::Decode(format!(
                "property 0x{:02X} declares {} bytes but frame ends early",
                epc, pdc
            ))
        })?;
        props.push(Property { epc, edt });
    }

    Ok(Frame {
        tid,
        seoj,
        deoj,
        esv,
        props,
    })
}

fn read_eoj(cursor: &mut Cursor<&[u8]>) -> Result<Eoj> {
    Ok(Eoj::new(cursor.read_u8()?, cursor.read_u8()?, cursor.read_u8()?))
}

/// A decoded inbound frame with property data rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub seoj: Eoj,
    pub deoj: Eoj,
    pub esv: u8,
    pub opc: u8,
    /// `(EPC, hex EDT)` in frame order
    pub details: Vec<(u8, String)>,
}

impl DecodedMessage {
    /// ESV as two hex digits, e.g. `72`.
    pub fn esv_hex(&self) -> String {
        format!("{:02x}", self.esv)
    }

    /// OPC as two hex digits, e.g. `01`.
    pub fn opc_hex(&self) -> String {
        format!("{:02x}", self.opc)
    }
}

impl From<Frame> for DecodedMessage {
    fn from(frame: Frame) -> Self {
        Self {
            seoj: frame.seoj,
            deoj: frame.deoj,
            esv: frame.esv,
            opc: frame.props.len() as u8,
            details: frame
                .props
                .into_iter()
                .map(|p| (p.epc, hex::encode(p.edt)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_res_bytes() -> Vec<u8> {
        vec![
            0x10, 0x81, 0x00, 0x2a, // header, TID 42
            0x02, 0x7e, 0x01, // SEOJ
            0x0e, 0xf0, 0x01, // DEOJ
            0x72, 0x02, // GET_RES, OPC 2
            0x80, 0x01, 0x30, // power ON
            0xce, 0x04, 0x00, 0x00, 0x9c, 0x40, // 40000 Wh
        ]
    }

    #[test]
    fn parses_get_response() {
        let frame = parse_frame(&get_res_bytes()).unwrap();
        assert_eq!(frame.tid, 42);
        assert_eq!(frame.seoj, V2H_EOJ);
        assert_eq!(frame.deoj, CONTROLLER_EOJ);
        assert_eq!(frame.service(), Some(ServiceCode::GetRes));
        assert_eq!(frame.props[0], Property::new(0x80, [0x30]));
        assert_eq!(frame.props[1].edt, vec![0x00, 0x00, 0x9c, 0x40]);
    }

    #[test]
    fn packs_get_request_like_the_wire() {
        let frame = Frame {
            tid: 1,
            seoj: CONTROLLER_EOJ,
            deoj: V2H_EOJ,
            esv: ServiceCode::Get.code(),
            props: vec![Property::request(0xc7)],
        };
        assert_eq!(
            pack_frame(&frame).unwrap(),
            vec![0x10, 0x81, 0x00, 0x01, 0x0e, 0xf0, 0x01, 0x02, 0x7e, 0x01, 0x62, 0x01, 0xc7, 0x00]
        );
    }

    #[test]
    fn rejects_truncated_property_data() {
        let mut bytes = get_res_bytes();
        bytes.truncate(bytes.len() - 2);
        let err = parse_frame(&bytes).unwrap_err();
        assert!(matches!(err, V2hError::Decode(_)), "{err}");
    }

    #[test]
    fn rejects_foreign_headers() {
        assert!(parse_frame(&[0x10, 0x81]).is_err());
        let mut bytes = get_res_bytes();
        bytes[0] = 0x11;
        assert!(parse_frame(&bytes).is_err());
        bytes[0] = 0x10;
        bytes[1] = EHD2_FORMAT2;
        assert!(parse_frame(&bytes).is_err());
    }

    #[test]
    fn decoded_message_uses_lowercase_hex() {
        let msg = DecodedMessage::from(parse_frame(&get_res_bytes()).unwrap());
        assert_eq!(msg.seoj.to_string(), "027e01");
        assert_eq!(msg.esv_hex(), "72");
        assert_eq!(msg.opc_hex(), "02");
        assert_eq!(
            msg.details,
            vec![(0x80, "30".to_string()), (0xce, "00009c40".to_string())]
        );
    }

    #[test]
    fn eoj_parsing_requires_six_hex_digits() {
        assert_eq!("027E01".parse::<Eoj>().unwrap(), V2H_EOJ);
        assert!("027e0".parse::<Eoj>().is_err());
        assert!("02zz01".parse::<Eoj>().is_err());
        assert!("027e0100".parse::<Eoj>().is_err());
    }

    #[test]
    fn service_code_table_round_trips_names() {
        for esv in ServiceCode::ALL {
            assert_eq!(ServiceCode::from_name(esv.name()), Some(*esv));
            assert_eq!(ServiceCode::from_u8(esv.code()), Some(*esv));
        }
        assert_eq!(ServiceCode::ALL.len(), 16);
        assert_eq!(ServiceCode::from_name("get"), None);
    }
}

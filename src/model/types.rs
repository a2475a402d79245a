use serde::{Deserialize, Serialize};

macro_rules! tdh_type {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $code:literal => $xml:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $code,)+
        }

        impl $name {
            /// The on-disk type code.
            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// The qualified name used by manifests.
            pub fn xml_name(self) -> &'static str {
                match self {
                    $($name::$variant => $xml,)+
                }
            }
        }
    };
}

tdh_type! {
    /// How a property value is laid out in the event payload.
    pub enum InType {
        Null = 0 => "win:Null",
        UnicodeString = 1 => "win:UnicodeString",
        AnsiString = 2 => "win:AnsiString",
        Int8 = 3 => "win:Int8",
        UInt8 = 4 => "win:UInt8",
        Int16 = 5 => "win:Int16",
        UInt16 = 6 => "win:UInt16",
        Int32 = 7 => "win:Int32",
        UInt32 = 8 => "win:UInt32",
        Int64 = 9 => "win:Int64",
        UInt64 = 10 => "win:UInt64",
        Float = 11 => "win:Float",
        Double = 12 => "win:Double",
        Boolean = 13 => "win:Boolean",
        Binary = 14 => "win:Binary",
        Guid = 15 => "win:GUID",
        Pointer = 16 => "win:Pointer",
        FileTime = 17 => "win:FILETIME",
        SystemTime = 18 => "win:SYSTEMTIME",
        Sid = 19 => "win:SID",
        HexInt32 = 20 => "win:HexInt32",
        HexInt64 = 21 => "win:HexInt64",
        CountedString = 22 => "win:CountedString",
        CountedAnsiString = 23 => "win:CountedAnsiString",
        ReversedCountedString = 24 => "win:ReversedCountedString",
        ReversedCountedAnsiString = 25 => "win:ReversedCountedAnsiString",
        NonNullTerminatedString = 26 => "win:NonNullTerminatedString",
        NonNullTerminatedAnsiString = 27 => "win:NonNullTerminatedAnsiString",
        UnicodeChar = 28 => "win:UnicodeChar",
        AnsiChar = 29 => "win:AnsiChar",
        SizeT = 30 => "win:SizeT",
        HexDump = 31 => "win:HexDump",
        WbemSid = 32 => "win:WBEMSid",
    }
}

tdh_type! {
    /// How a property value is rendered.
    pub enum OutType {
        Null = 0 => "xs:Null",
        String = 1 => "xs:string",
        DateTime = 2 => "xs:dateTime",
        Byte = 3 => "xs:byte",
        UnsignedByte = 4 => "xs:unsignedByte",
        Short = 5 => "xs:short",
        UnsignedShort = 6 => "xs:unsignedShort",
        Int = 7 => "xs:int",
        UnsignedInt = 8 => "xs:unsignedInt",
        Long = 9 => "xs:long",
        UnsignedLong = 10 => "xs:unsignedLong",
        Float = 11 => "xs:float",
        Double = 12 => "xs:double",
        Boolean = 13 => "xs:boolean",
        Guid = 14 => "xs:GUID",
        HexBinary = 15 => "xs:hexBinary",
        HexInt8 = 16 => "win:HexInt8",
        HexInt16 = 17 => "win:HexInt16",
        HexInt32 = 18 => "win:HexInt32",
        HexInt64 = 19 => "win:HexInt64",
        Pid = 20 => "win:PID",
        Tid = 21 => "win:TID",
        Port = 22 => "win:Port",
        Ipv4 = 23 => "win:IPv4",
        Ipv6 = 24 => "win:IPv6",
        SocketAddress = 25 => "win:SocketAddress",
        CimDateTime = 26 => "win:CIMDateTime",
        EtwTime = 27 => "win:ETWTIME",
        Xml = 28 => "win:Xml",
        ErrorCode = 29 => "win:ErrorCode",
        Win32Error = 30 => "win:Win32Error",
        NtStatus = 31 => "win:NTSTATUS",
        HResult = 32 => "win:HResult",
        CultureInsensitiveDateTime = 33 => "win:DateTimeCultureInsensitive",
        Json = 34 => "win:Json",
        Utf8 = 35 => "win:Utf8",
    }
}

impl InType {
    /// The rendering used when a property does not name one.
    pub fn default_out_type(self) -> OutType {
        match self {
            InType::Null => OutType::Null,
            InType::UnicodeString
            | InType::AnsiString
            | InType::CountedString
            | InType::CountedAnsiString
            | InType::ReversedCountedString
            | InType::ReversedCountedAnsiString
            | InType::NonNullTerminatedString
            | InType::NonNullTerminatedAnsiString
            | InType::UnicodeChar
            | InType::AnsiChar => OutType::String,
            InType::Int8 => OutType::Byte,
            InType::UInt8 => OutType::UnsignedByte,
            InType::Int16 => OutType::Short,
            InType::UInt16 => OutType::UnsignedShort,
            InType::Int32 => OutType::Int,
            InType::UInt32 => OutType::UnsignedInt,
            InType::Int64 => OutType::Long,
            InType::UInt64 => OutType::UnsignedLong,
            InType::Float => OutType::Float,
            InType::Double => OutType::Double,
            InType::Boolean => OutType::Boolean,
            InType::Binary | InType::HexDump => OutType::HexBinary,
            InType::Guid => OutType::Guid,
            InType::Pointer | InType::SizeT => OutType::HexInt64,
            InType::FileTime | InType::SystemTime => OutType::DateTime,
            InType::Sid | InType::WbemSid => OutType::String,
            InType::HexInt32 => OutType::HexInt32,
            InType::HexInt64 => OutType::HexInt64,
        }
    }

    /// The BinXml value type used for a substitution of this property.
    ///
    /// Codes `0x00..=0x15` coincide with the TDH input types; the extended input types map to
    /// the closest BinXml type.
    pub fn binxml_value_type(self) -> u8 {
        match self {
            InType::CountedString
            | InType::ReversedCountedString
            | InType::NonNullTerminatedString
            | InType::UnicodeChar => InType::UnicodeString.code(),
            InType::CountedAnsiString
            | InType::ReversedCountedAnsiString
            | InType::NonNullTerminatedAnsiString
            | InType::AnsiChar => InType::AnsiString.code(),
            InType::SizeT => InType::Pointer.code(),
            InType::HexDump => InType::Binary.code(),
            InType::WbemSid => InType::Sid.code(),
            other => other.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_from_code() {
        for code in 0..=32u8 {
            let t = InType::from_code(code).expect("contiguous in-type codes");
            assert_eq!(t.code(), code);
        }
        assert_eq!(InType::from_code(33), None);
        assert_eq!(OutType::from_code(35), Some(OutType::Utf8));
    }

    #[test]
    fn test_extended_types_map_to_binxml_base_types() {
        assert_eq!(InType::CountedString.binxml_value_type(), 0x01);
        assert_eq!(InType::AnsiChar.binxml_value_type(), 0x02);
        assert_eq!(InType::HexInt64.binxml_value_type(), 0x15);
        assert_eq!(InType::SizeT.binxml_value_type(), 0x10);
    }
}

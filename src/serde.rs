use std::borrow::Cow;

use serde::{
    de::{self, Visitor},
    ser::SerializeStruct,
    Deserialize, Serialize,
};

use crate::{Angle, Joint, JointId, Skeleton, Vector};

impl Serialize for Skeleton {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("Skeleton", 3)?;
        s.serialize_field("root_position", &self.root_position)?;
        s.serialize_field("root_direction", &self.root_direction)?;
        // The root joint is implied.
        s.serialize_field("joints", &self.joints[1..])?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Skeleton {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_struct(
            "Skeleton",
            &["root_position", "root_direction", "joints"],
            SkeletonVisitor,
        )
    }
}

struct SkeletonVisitor;

impl<'de> Visitor<'de> for SkeletonVisitor {
    type Value = Skeleton;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a Skeleton")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut root_position = None;
        let mut root_direction = None;
        let mut joints = Vec::<DeserializedJoint>::new();
        while let Some(key) = map.next_key::<Cow<'de, str>>()? {
            match &*key {
                "root_position" => {
                    root_position = Some(map.next_value::<Vector>()?);
                }
                "root_direction" => {
                    root_direction = Some(map.next_value::<Vector>()?);
                }
                "joints" => {
                    joints = map.next_value()?;
                }
                _ => {
                    return Err(<A::Error as de::Error>::custom(format!(
                        "unexpected field {key}"
                    )))
                }
            }
        }

        let mut skeleton = Skeleton::new(
            root_position.ok_or_else(|| <A::Error as de::Error>::missing_field("root_position"))?,
            root_direction
                .ok_or_else(|| <A::Error as de::Error>::missing_field("root_direction"))?,
        );
        // Rebuilding joint by joint re-validates every parent and length.
        for joint in joints {
            skeleton
                .add_labeled_joint(joint.label, joint.parent, joint.length, joint.angle)
                .map_err(<A::Error as de::Error>::custom)?;
        }
        Ok(skeleton)
    }
}

impl Serialize for Joint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let field_count = 3 + usize::from(self.label.is_some());
        let mut j = serializer.serialize_struct("Joint", field_count)?;
        j.serialize_field("parent", &self.parent.unwrap_or(JointId::ROOT))?;
        j.serialize_field("length", &self.length)?;
        j.serialize_field("angle", &self.angle)?;
        if let Some(label) = &self.label {
            j.serialize_field("label", &**label)?;
        }
        j.end()
    }
}

#[derive(Deserialize)]
struct DeserializedJoint {
    parent: JointId,
    length: f64,
    angle: Angle,
    #[serde(default)]
    label: String,
}

#[test]
fn roundtrip() {
    let mut s = Skeleton::new(Vector::new(1., 2.), Vector::new(0., -1.));
    let hip = s
        .add_labeled_joint("hip", JointId::ROOT, 1.5, Angle::degrees(30.))
        .unwrap();
    let knee = s.add_joint(hip, 2.0, Angle::degrees(300.)).unwrap();
    let serialized = pot::to_vec(&s).unwrap();
    let deserialized: Skeleton = dbg!(pot::from_slice(&serialized).unwrap());
    assert_eq!(deserialized, s);
    assert_eq!(deserialized.find_joint_by_label("hip"), Some(hip));
    assert_eq!(deserialized[knee].label(), "");
    assert_eq!(deserialized[knee].angle(), Angle::degrees(300.));
    assert_eq!(deserialized.root_direction(), Vector::new(0., -1.));
}

#[test]
fn invalid_parent_is_rejected() {
    let mut s = Skeleton::default();
    let first = s.add_joint(JointId::ROOT, 1., Angle::ZERO).unwrap();
    s.add_joint(first, 1., Angle::ZERO).unwrap();
    // Reordering the joints leaves the first stored joint pointing forward.
    s.joints.swap(1, 2);
    let serialized = pot::to_vec(&s).unwrap();
    assert!(pot::from_slice::<Skeleton>(&serialized).is_err());
}
